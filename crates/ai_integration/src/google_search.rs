use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::{upstream_error_message, ImageSearch, IntegrationError};

const SERVICE: &str = "google-search";

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";
pub const NO_IMAGE_FOUND: &str = "No image found for this item.";
pub const SEARCH_FAILED: &str = "Failed to search for image.";

#[derive(Debug, Clone)]
pub struct GoogleSearchConfig {
    pub api_key: String,
    /// Programmable Search Engine id (`cx`).
    pub engine_id: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GoogleSearchConfig {
    pub fn new(api_key: impl Into<String>, engine_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            engine_id: engine_id.into(),
            base_url: DEFAULT_BASE_URL.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

pub struct GoogleImageSearch {
    http: Client,
    config: GoogleSearchConfig,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    link: Option<String>,
}

impl GoogleImageSearch {
    pub fn new(config: GoogleSearchConfig) -> Result<Self, IntegrationError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| IntegrationError::Transport {
                service: SERVICE,
                source,
            })?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl ImageSearch for GoogleImageSearch {
    async fn top_image(&self, query: &str) -> Result<String, IntegrationError> {
        debug!(%query, "searching for images");
        let response = self
            .http
            .get(format!(
                "{}/customsearch/v1",
                self.config.base_url.trim_end_matches('/')
            ))
            .query(&[
                ("key", self.config.api_key.as_str()),
                ("cx", self.config.engine_id.as_str()),
                ("q", query),
                ("searchType", "image"),
                ("num", "1"),
                ("safe", "high"),
            ])
            .send()
            .await
            .map_err(|source| IntegrationError::Transport {
                service: SERVICE,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IntegrationError::Upstream {
                service: SERVICE,
                status: status.as_u16(),
                message: upstream_error_message(&body).unwrap_or_else(|| SEARCH_FAILED.into()),
            });
        }

        let body: SearchResponse = response.json().await.map_err(|e| {
            IntegrationError::BadResponse(format!("failed to decode search response: {e}"))
        })?;

        let link = body
            .items
            .into_iter()
            .next()
            .and_then(|item| item.link)
            .filter(|link| !link.is_empty());
        match link {
            Some(link) => {
                info!(%query, %link, "found image");
                Ok(link)
            }
            None => {
                info!(%query, "no image found");
                Err(IntegrationError::NotFound(NO_IMAGE_FOUND.into()))
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/google_search_tests.rs"]
mod tests;
