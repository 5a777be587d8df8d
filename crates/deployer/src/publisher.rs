//! Replace-in-place publication of artifacts to object storage.

use std::path::Path;
use std::sync::Arc;

use hzdeploy_cloud::{CloudProviderError, ObjectStore};
use tracing::info;

use crate::error::{DeployError, Result};

/// Content type of the generated membership document.
pub const TEXT_PLAIN: &str = "text/plain";

/// Content type of the deployable package.
pub const APPLICATION_ZIP: &str = "application/zip";

/// Publishes named payloads into one bucket, replacing whatever was there.
///
/// A publish is delete-then-put and is not transactional: if the process
/// dies between the two calls the key is left absent. Readers must treat a
/// missing artifact as "not published yet" and retry.
#[derive(Clone)]
pub struct ArtifactPublisher {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ArtifactPublisher {
    /// Create a publisher for `bucket`.
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Bucket this publisher writes to.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn publish_error(&self, key: &str, source: CloudProviderError) -> DeployError {
        DeployError::PublishFailure {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            source,
        }
    }

    /// Replace `key` with `payload`.
    ///
    /// # Errors
    /// Returns [`DeployError::PublishFailure`] if the delete (other than
    /// not-found) or the upload fails.
    pub async fn publish(&self, key: &str, payload: Vec<u8>, content_type: &str) -> Result<()> {
        info!(bucket = %self.bucket, key, "Deleting previous artifact");
        match self.store.delete_object(&self.bucket, key).await {
            Ok(()) | Err(CloudProviderError::NotFound(_)) => {}
            Err(e) => return Err(self.publish_error(key, e)),
        }

        let length = payload.len();
        info!(bucket = %self.bucket, key, length, content_type, "Storing artifact");
        self.store
            .put_object(&self.bucket, key, payload, content_type)
            .await
            .map_err(|e| self.publish_error(key, e))
    }

    /// Replace `key` with the contents of a local file.
    ///
    /// # Errors
    /// Returns [`DeployError::Io`] if the file cannot be read, otherwise as
    /// [`publish`](Self::publish).
    pub async fn publish_file(&self, key: &str, path: &Path, content_type: &str) -> Result<()> {
        let payload = tokio::fs::read(path).await.map_err(|source| DeployError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.publish(key, payload, content_type).await
    }

    /// Read back the artifact stored under `key`.
    ///
    /// # Errors
    /// Returns [`DeployError::PublishFailure`] if the fetch fails, including
    /// when the key is absent.
    pub async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        self.store
            .get_object(&self.bucket, key)
            .await
            .map_err(|e| self.publish_error(key, e))
    }
}
