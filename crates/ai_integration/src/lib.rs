//! Clients for the third-party services behind the menu server: a vision model that
//! reads menu photos, an image generator and a web image search.
use async_trait::async_trait;
use shared::domain::MenuItem;
use thiserror::Error;

pub mod google_search;
pub mod menu_parse;
pub mod openai;

pub use google_search::{GoogleImageSearch, GoogleSearchConfig};
pub use menu_parse::parse_menu_content;
pub use openai::{OpenAiClient, OpenAiConfig};

pub const IMAGE_KEY_MISSING: &str = "Server configuration error: image API key is not set.";
pub const SEARCH_CREDENTIALS_MISSING: &str =
    "Server configuration error: Google API credentials are not set.";

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("{0}")]
    Configuration(String),
    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} returned {status}: {message}")]
    Upstream {
        service: &'static str,
        status: u16,
        message: String,
    },
    #[error("{0}")]
    BadResponse(String),
    #[error("{0}")]
    NotFound(String),
}

impl IntegrationError {
    /// Text suitable for an end user: the upstream's own message where it sent one.
    pub fn user_message(&self) -> String {
        match self {
            IntegrationError::Upstream { message, .. } => message.clone(),
            IntegrationError::Transport { source, .. } => source.to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MenuImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait MenuReader: Send + Sync {
    /// Reads the photo and returns its items in reading order.
    async fn read_menu(&self, image: &MenuImage) -> Result<Vec<MenuItem>, IntegrationError>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Returns the URL of one image generated from `prompt`, used verbatim.
    async fn generate(&self, prompt: &str) -> Result<String, IntegrationError>;
}

#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// Returns the link of the top image hit for `query`.
    async fn top_image(&self, query: &str) -> Result<String, IntegrationError>;
}

/// Stand-in used when no image API key is configured.
pub struct MissingImageApi;

#[async_trait]
impl MenuReader for MissingImageApi {
    async fn read_menu(&self, _image: &MenuImage) -> Result<Vec<MenuItem>, IntegrationError> {
        Err(IntegrationError::Configuration(IMAGE_KEY_MISSING.into()))
    }
}

#[async_trait]
impl ImageGenerator for MissingImageApi {
    async fn generate(&self, _prompt: &str) -> Result<String, IntegrationError> {
        Err(IntegrationError::Configuration(IMAGE_KEY_MISSING.into()))
    }
}

/// Stand-in used when the search key or engine id is missing.
pub struct MissingImageSearch;

#[async_trait]
impl ImageSearch for MissingImageSearch {
    async fn top_image(&self, _query: &str) -> Result<String, IntegrationError> {
        Err(IntegrationError::Configuration(
            SEARCH_CREDENTIALS_MISSING.into(),
        ))
    }
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub(crate) error: Option<ErrorDetail>,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ErrorDetail {
    pub(crate) message: Option<String>,
}

/// Pulls `error.message` out of a failed response body, the shape both OpenAI and Google use.
pub(crate) fn upstream_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(|detail| detail.message)
        .filter(|message| !message.trim().is_empty())
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
