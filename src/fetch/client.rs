// src/fetch/client.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;

use super::PageSource;
use crate::utils::error::FetchError;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) job_extractor/0.1";
// One detail page at a time, with a pause before each request.
const REQUEST_DELAY_MS: u64 = 1500;

/// Fetches detail pages over HTTP, one at a time.
pub struct HttpPageSource {
    client: reqwest::Client,
    delay: Duration,
}

impl HttpPageSource {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_delay(Duration::from_millis(REQUEST_DELAY_MS))
    }

    pub fn with_delay(delay: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, delay })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!("Downloading page from: {}", url);

        tokio::time::sleep(self.delay).await;

        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "text/html,application/xhtml+xml,*/*")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!("HTTP error status: {} for URL: {}", status, url);
            if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                tracing::warn!("Received {} - backing off is needed.", status);
                return Err(FetchError::RateLimited);
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(FetchError::NotFound(url.to_string()));
            }
            return Err(FetchError::Http(status));
        }

        let body = response.text().await?;
        tracing::debug!("Downloaded {} bytes from {}", body.len(), url);
        Ok(body)
    }
}
