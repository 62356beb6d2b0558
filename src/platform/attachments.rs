use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use super::AttachmentStore;
use crate::error::{Result, TollgateError};

const FETCH: &str = "fetch_attachment";

fn download_failed(err: reqwest::Error) -> TollgateError {
    TollgateError::Platform {
        operation: FETCH.to_string(),
        message: err.to_string(),
        status: err.status().map(|s| s.as_u16()),
    }
}

/// Downloads attachments over HTTP and writes them to a local directory.
pub struct LocalAttachmentStore {
    dir: PathBuf,
    http: reqwest::Client,
}

impl LocalAttachmentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| TollgateError::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            dir: dir.into(),
            http,
        })
    }
}

#[async_trait]
impl AttachmentStore for LocalAttachmentStore {
    /// Failures are plain platform errors, never `Unauthorized`: the CDN
    /// answering 401 says nothing about the bot token.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(download_failed)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TollgateError::Platform {
                operation: FETCH.to_string(),
                message: format!("HTTP {} for {}", status.as_u16(), url),
                status: Some(status.as_u16()),
            });
        }

        let bytes = response.bytes().await.map_err(download_failed)?;
        Ok(bytes.to_vec())
    }

    async fn store_file(&self, file_name: &str, bytes: &[u8]) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "Attachment stored");
        Ok(path.to_string_lossy().into_owned())
    }
}
