//! AWS credentials.

use std::path::Path;

use crate::providers::traits::CloudProviderError;

/// Static AWS credentials.
#[derive(Clone)]
pub struct Credentials {
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Session token for temporary credentials.
    pub session_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    /// Create credentials from an access key pair.
    #[must_use]
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    /// Attach a session token.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Parse a Java-style properties document with `accessKey` and
    /// `secretKey` entries.
    ///
    /// # Errors
    /// Returns [`CloudProviderError::Config`] if either key is missing or empty.
    pub fn from_properties(contents: &str) -> Result<Self, CloudProviderError> {
        let mut access_key = None;
        let mut secret_key = None;

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let Some((key, value)) = line.split_once(['=', ':']) else {
                continue;
            };
            match key.trim() {
                "accessKey" => access_key = Some(value.trim().to_string()),
                "secretKey" => secret_key = Some(value.trim().to_string()),
                _ => {}
            }
        }

        match (access_key, secret_key) {
            (Some(access), Some(secret)) if !access.is_empty() && !secret.is_empty() => {
                Ok(Self::new(access, secret))
            }
            _ => Err(CloudProviderError::Config(
                "credentials file must define accessKey and secretKey".to_string(),
            )),
        }
    }

    /// Load credentials from a properties file.
    ///
    /// # Errors
    /// Returns [`CloudProviderError::Config`] if the file cannot be read or
    /// does not define both keys.
    pub async fn from_properties_file(path: &Path) -> Result<Self, CloudProviderError> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            CloudProviderError::Config(format!(
                "Failed to read credentials file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_properties(&contents)
    }
}
