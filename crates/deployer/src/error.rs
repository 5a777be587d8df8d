//! Deployment errors.

use std::path::PathBuf;
use std::time::Duration;

use hzdeploy_cloud::CloudProviderError;
use thiserror::Error;

/// Errors that abort a deployment step.
#[derive(Error, Debug)]
pub enum DeployError {
    /// The provider rejected a create, describe, terminate or reboot request.
    #[error("{operation} failed: {source}")]
    ProvisioningFailure {
        /// Operation that failed (e.g. `launch`, `terminate`).
        operation: &'static str,
        /// Provider error.
        #[source]
        source: CloudProviderError,
    },

    /// A storage delete or put failed.
    #[error("publishing s3://{bucket}/{key} failed: {source}")]
    PublishFailure {
        /// Bucket of the artifact.
        bucket: String,
        /// Key of the artifact.
        key: String,
        /// Provider error.
        #[source]
        source: CloudProviderError,
    },

    /// A polled resource did not become ready within the configured bounds.
    #[error("{resource} not ready after {attempts} attempts ({elapsed:?})")]
    ProvisioningTimeout {
        /// Resource being waited on.
        resource: String,
        /// Number of queries issued.
        attempts: u32,
        /// Time spent waiting.
        elapsed: Duration,
    },

    /// A request that cannot be sent as asked.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Local file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl DeployError {
    fn provider_error(&self) -> Option<&CloudProviderError> {
        match self {
            Self::ProvisioningFailure { source, .. } | Self::PublishFailure { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }

    /// HTTP status code reported by the provider, if any.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.provider_error()
            .and_then(CloudProviderError::service)
            .map(|s| s.status)
    }

    /// Provider error code, if any.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        self.provider_error()
            .and_then(CloudProviderError::service)
            .map(|s| s.code.as_str())
    }

    /// Provider request id, if any.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.provider_error()
            .and_then(CloudProviderError::service)
            .and_then(|s| s.request_id.as_deref())
    }
}

/// Convenience alias.
pub type Result<T, E = DeployError> = std::result::Result<T, E>;
