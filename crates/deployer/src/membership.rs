//! Hazelcast membership configuration.
//!
//! Workers read this document from object storage to find the master. It is
//! regenerated from scratch on every deploy; the only input that varies is
//! the master's private address.

use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};

/// Default cluster group name.
pub const DEFAULT_GROUP_NAME: &str = "dev";

/// Default cluster group password.
pub const DEFAULT_GROUP_PASSWORD: &str = "dev-pass";

/// Default member port.
pub const DEFAULT_PORT: u16 = 5701;

/// Default multicast group (multicast discovery is disabled).
pub const DEFAULT_MULTICAST_GROUP: &str = "224.2.2.3";

/// Default multicast port.
pub const DEFAULT_MULTICAST_PORT: u16 = 54327;

/// Fixed settings of the membership document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MembershipConfig {
    /// Cluster group name.
    pub group_name: String,
    /// Cluster group password.
    pub group_password: String,
    /// Member port; auto-increment is always on.
    pub port: u16,
    /// Multicast group address.
    pub multicast_group: String,
    /// Multicast port.
    pub multicast_port: u16,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            group_name: DEFAULT_GROUP_NAME.to_string(),
            group_password: DEFAULT_GROUP_PASSWORD.to_string(),
            port: DEFAULT_PORT,
            multicast_group: DEFAULT_MULTICAST_GROUP.to_string(),
            multicast_port: DEFAULT_MULTICAST_PORT,
        }
    }
}

impl MembershipConfig {
    /// Render the document with `master_address` as the only required member.
    ///
    /// Substituted text is XML-escaped; plain host names and IPs come out
    /// unchanged.
    #[must_use]
    pub fn render(&self, master_address: &str) -> String {
        let group_name = escape(self.group_name.as_str());
        let group_password = escape(self.group_password.as_str());
        let multicast_group = escape(self.multicast_group.as_str());
        let master_address = escape(master_address);
        let Self {
            port,
            multicast_port,
            ..
        } = self;

        format!(
            r#"<hazelcast>
 <group>
 <name>{group_name}</name>
 <password>{group_password}</password>
 </group>
 <network>
    <port auto-increment="true">{port}</port>
   <join>
      <multicast enabled="false">
         <multicast-group>{multicast_group}</multicast-group>
         <multicast-port>{multicast_port}</multicast-port>
      </multicast>
      <tcp-ip enabled="true">
        <required-member>{master_address}</required-member>
      </tcp-ip>
    </join>
 </network>
</hazelcast>
"#
        )
    }
}

/// Render the membership document with the default settings.
#[must_use]
pub fn render_config(master_address: &str) -> String {
    MembershipConfig::default().render(master_address)
}
