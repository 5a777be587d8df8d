//! Cloud provider traits and common types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failure reported by the provider's API itself (as opposed to transport).
///
/// Carries everything an operator needs to chase the failure with the
/// provider: HTTP status, the provider's error code and the request id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    /// HTTP status code of the response.
    pub status: u16,
    /// Provider error code (e.g. `InvalidAMIID.Malformed`, `AccessDenied`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Provider request id, if the response carried one.
    pub request_id: Option<String>,
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.status, self.message)?;
        if let Some(request_id) = &self.request_id {
            write!(f, " [request id: {request_id}]")?;
        }
        Ok(())
    }
}

/// Errors that can occur during cloud provider operations.
#[derive(Error, Debug)]
pub enum CloudProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {0}")]
    Service(ServiceError),

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Response body could not be decoded.
    #[error("Malformed response: {0}")]
    Xml(#[from] quick_xml::DeError),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CloudProviderError {
    /// The provider's service error, if this failure came from the API.
    #[must_use]
    pub fn service(&self) -> Option<&ServiceError> {
        match self {
            Self::Service(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the provider reported the resource as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

// ============================================================================
// Instance types
// ============================================================================

/// Instance lifecycle state as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    /// Instance is being created.
    Pending,
    /// Instance is running.
    Running,
    /// Instance is rebooting (transient sub-state of running).
    Rebooting,
    /// Instance is being terminated.
    ShuttingDown,
    /// Instance is terminated.
    Terminated,
    /// Instance is stopping.
    Stopping,
    /// Instance is stopped.
    Stopped,
    /// Unknown state.
    #[serde(other)]
    Unknown,
}

impl InstanceState {
    /// Provider-side name of the state, as used in filters.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Rebooting => "rebooting",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Unknown => "unknown",
        }
    }
}

impl std::str::FromStr for InstanceState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "rebooting" => Self::Rebooting,
            "shutting-down" => Self::ShuttingDown,
            "terminated" => Self::Terminated,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            _ => Self::Unknown,
        })
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compute instance as last observed from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Provider-assigned instance id.
    pub id: String,
    /// Image the instance was launched from.
    pub image_id: String,
    /// Instance type/size.
    pub instance_type: String,
    /// Current lifecycle state.
    pub state: InstanceState,
    /// Cluster-reachable address. Absent until the instance is scheduled.
    pub private_address: Option<String>,
    /// Internet-reachable address. Display only.
    pub public_address: Option<String>,
    /// Availability zone.
    pub zone: Option<String>,
}

impl Instance {
    /// The private address, if the provider has assigned a non-empty one.
    #[must_use]
    pub fn private_address(&self) -> Option<&str> {
        self.private_address.as_deref().filter(|a| !a.is_empty())
    }

    /// Whether the instance can be addressed by other cluster members.
    #[must_use]
    pub fn is_addressable(&self) -> bool {
        self.private_address().is_some()
    }
}

/// Request to launch one or more identical instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchRequest {
    /// Image to boot.
    pub image_id: String,
    /// Instance type/size.
    pub instance_type: String,
    /// Number of instances (used as both minimum and maximum).
    pub count: u32,
    /// SSH key pair name.
    pub key_pair: String,
    /// Security group names.
    pub security_groups: Vec<String>,
    /// Availability zone to place the instances in.
    pub zone: String,
}

/// Result of a launch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Provider request id of the launch call.
    pub request_id: String,
    /// Provider reservation id, if any.
    pub reservation_id: Option<String>,
    /// Ids of the created instances, in the order the provider returned them.
    pub instance_ids: Vec<String>,
}

/// Compute side of a cloud provider.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Launch `req.count` instances.
    async fn create_instances(&self, req: &LaunchRequest)
        -> Result<Reservation, CloudProviderError>;

    /// Describe a single instance.
    ///
    /// Returns [`CloudProviderError::NotFound`] when the provider does not
    /// (yet) know the id.
    async fn describe_instance(&self, id: &str) -> Result<Instance, CloudProviderError>;

    /// List instances, optionally restricted to one state.
    async fn list_instances(
        &self,
        state: Option<InstanceState>,
    ) -> Result<Vec<Instance>, CloudProviderError>;

    /// Terminate the given instances.
    async fn terminate_instances(&self, ids: &[String]) -> Result<(), CloudProviderError>;

    /// Reboot the given instances.
    async fn reboot_instances(&self, ids: &[String]) -> Result<(), CloudProviderError>;
}

/// Object storage side of a cloud provider.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload `body` under `bucket/key`. The content length is `body.len()`.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), CloudProviderError>;

    /// Fetch the object stored under `bucket/key`.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, CloudProviderError>;

    /// Delete `bucket/key`. Deleting a missing key succeeds.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), CloudProviderError>;
}
