//! Downloads remote files that are about to be re-uploaded to the API.

use async_trait::async_trait;
use courier_core::error::CourierError;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `url` in full. No retries at this layer.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, CourierError>;
}

/// reqwest-backed fetcher with a short, whole-request timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, CourierError> {
        let download_error = |reason: String| CourierError::Download {
            url: url.to_string(),
            reason,
        };

        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(download_error(format!("HTTP {status}")));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        debug!("downloaded {url} ({} bytes)", bytes.len());
        Ok(bytes.to_vec())
    }
}
