use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::config::ScraperConfig;

/// A document retrieved with a successful status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedPage {
    pub url: String,
    pub final_url: String, // After redirects
    pub status: u16,
    pub body: String,
    pub response_time_ms: u64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("{0}")]
    Transport(String),

    #[error("{url} returned {status}")]
    Status { url: String, status: u16 },
}

pub type FetchResult = std::result::Result<FetchedPage, FetchError>;

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchResult;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &ScraperConfig) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResult {
        let parsed = Url::parse(url).map_err(|e| FetchError::Transport(format!("invalid url {}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::Transport(format!("unsupported scheme: {}", parsed.scheme())));
        }

        let start_time = Instant::now();
        info!(url, "visiting");

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            debug!(url, status = status.as_u16(), "request failed");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(FetchedPage {
            url: url.to_string(),
            final_url,
            status: status.as_u16(),
            body,
            response_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }
}
