use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {status} fetching {url}")]
    Status { url: String, status: reqwest::StatusCode },
}

/// Downloads an employee's stored reference photo.
#[async_trait]
pub trait ReferenceImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

#[derive(Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout_millis: u64) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_millis))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ReferenceImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;

        // Redirect targets are followed by the client; anything but a plain
        // 200 afterwards is treated as a failed download.
        if response.status() != reqwest::StatusCode::OK {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}
