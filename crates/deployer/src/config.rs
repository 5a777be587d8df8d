//! Deployment configuration.
//!
//! Everything the deployer needs to know about the target account lives in
//! one [`DeployConfig`], loaded once at startup and passed down explicitly.
//! Every field has a default, so an empty (or absent) file is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backoff::BackoffConfig;
use crate::error::{DeployError, Result};
use crate::membership::MembershipConfig;

/// Machine image architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// 32-bit image.
    #[default]
    I386,
    /// 64-bit image.
    X86_64,
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::I386 => write!(f, "i386"),
            Self::X86_64 => write!(f, "x86_64"),
        }
    }
}

impl std::str::FromStr for Arch {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "i386" | "32" | "32bit" => Ok(Self::I386),
            "x86_64" | "64" | "64bit" => Ok(Self::X86_64),
            _ => Err(DeployError::Config(format!(
                "Unknown architecture: {s}. Supported: i386, x86_64"
            ))),
        }
    }
}

/// Image ids per architecture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageIds {
    /// 32-bit image.
    pub i386: String,
    /// 64-bit image.
    pub x86_64: String,
}

impl Default for ImageIds {
    fn default() -> Self {
        Self {
            i386: "ami-799f7010".to_string(),
            x86_64: "ami-15ed027c".to_string(),
        }
    }
}

impl ImageIds {
    /// Image id for `arch`.
    #[must_use]
    pub fn for_arch(&self, arch: Arch) -> &str {
        match arch {
            Arch::I386 => &self.i386,
            Arch::X86_64 => &self.x86_64,
        }
    }
}

/// Where new instances go and how they are reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// SSH key pair name.
    pub key_pair: String,
    /// Security group names.
    pub security_groups: Vec<String>,
    /// Availability zone.
    pub zone: String,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            key_pair: "start".to_string(),
            security_groups: vec!["default".to_string()],
            zone: "us-east-1a".to_string(),
        }
    }
}

/// Where artifacts are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Bucket holding both artifacts.
    pub bucket: String,
    /// Key of the deployable package.
    pub package_key: String,
    /// Local path of the deployable package.
    pub package_path: PathBuf,
    /// Key of the membership document.
    pub config_key: String,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            bucket: "hazelcast".to_string(),
            package_key: "hazelcast.zip".to_string(),
            package_path: PathBuf::from("hazelcast.zip"),
            config_key: "hazelcast.xml".to_string(),
        }
    }
}

/// Endpoint overrides, for S3/EC2-compatible services and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// EC2 endpoint URL.
    pub ec2: Option<String>,
    /// S3 endpoint URL (path-style addressing).
    pub s3: Option<String>,
}

/// Full deployment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// AWS region.
    pub region: String,
    /// Instance placement.
    pub placement: PlacementConfig,
    /// Artifact locations.
    pub artifacts: ArtifactConfig,
    /// Image ids per architecture.
    pub images: ImageIds,
    /// Default architecture.
    pub arch: Arch,
    /// Default instance type.
    pub instance_type: String,
    /// Default total node count (1 master + N-1 workers).
    pub instance_count: u32,
    /// Readiness polling policy.
    pub poll: BackoffConfig,
    /// Membership document settings.
    pub membership: MembershipConfig,
    /// Endpoint overrides.
    pub endpoints: EndpointConfig,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            placement: PlacementConfig::default(),
            artifacts: ArtifactConfig::default(),
            images: ImageIds::default(),
            arch: Arch::default(),
            instance_type: "m1.small".to_string(),
            instance_count: 2,
            poll: BackoffConfig::default(),
            membership: MembershipConfig::default(),
            endpoints: EndpointConfig::default(),
        }
    }
}

impl DeployConfig {
    /// Parse configuration from YAML.
    ///
    /// # Errors
    /// Returns [`DeployError::Config`] if the YAML is malformed or invalid.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)
                .map_err(|e| DeployError::Config(format!("Failed to parse config YAML: {e}")))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns [`DeployError::Io`] if the file cannot be read, or
    /// [`DeployError::Config`] if it is malformed or invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| DeployError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&contents)?;
        info!(path = %path.display(), region = %config.region, "Loaded deploy configuration");
        Ok(config)
    }

    /// Image id for `arch`.
    #[must_use]
    pub fn image_for(&self, arch: Arch) -> &str {
        self.images.for_arch(arch)
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    /// Returns [`DeployError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("region", self.region.as_str()),
            ("placement.key_pair", self.placement.key_pair.as_str()),
            ("placement.zone", self.placement.zone.as_str()),
            ("artifacts.bucket", self.artifacts.bucket.as_str()),
            ("artifacts.package_key", self.artifacts.package_key.as_str()),
            ("artifacts.config_key", self.artifacts.config_key.as_str()),
            ("instance_type", self.instance_type.as_str()),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(DeployError::Config(format!("{field} must not be empty")));
        }
        if self.artifacts.package_key == self.artifacts.config_key {
            return Err(DeployError::Config(
                "artifacts.package_key and artifacts.config_key must differ".to_string(),
            ));
        }
        if self.instance_count == 0 {
            return Err(DeployError::Config(
                "instance_count must be at least 1".to_string(),
            ));
        }
        self.poll.validate()
    }
}
