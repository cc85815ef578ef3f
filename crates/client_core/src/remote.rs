use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, StatusCode,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::MenuItem,
    error::ApiError,
    protocol::{
        ImagePromptRequest, ImageUrlResponse, MenuItemsResponse, GENERATE_IMAGE_ROUTE,
        SEARCH_IMAGE_ROUTE, UPLOAD_FILE_FIELD, UPLOAD_ROUTE,
    },
};
use tracing::{debug, warn};

use crate::error::ServiceError;

pub const EXTRACT_FAILED: &str = "Failed to extract text from image.";
pub const FIND_FAILED: &str = "Failed to find image.";
pub const GENERATE_FAILED: &str = "Failed to generate image.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuUpload {
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// The three remote operations the menu session depends on. No implementation retries.
#[async_trait]
pub trait MenuBackend: Send + Sync {
    async fn extract_menu(&self, upload: &MenuUpload) -> Result<Vec<MenuItem>, ServiceError>;
    async fn search_image(&self, query: &str) -> Result<String, ServiceError>;
    async fn generate_image(&self, prompt: &str) -> Result<String, ServiceError>;
}

/// Talks to the menu server over HTTP.
pub struct HttpMenuBackend {
    http: Client,
    server_url: String,
}

impl HttpMenuBackend {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            server_url: server_url.into(),
        }
    }

    pub fn with_timeout(
        server_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            server_url: server_url.into(),
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}{route}", self.server_url.trim_end_matches('/'))
    }

    async fn post_prompt(
        &self,
        route: &str,
        prompt: &str,
        fallback: &str,
    ) -> Result<String, ServiceError> {
        let response = self
            .http
            .post(self.url(route))
            .json(&ImagePromptRequest::new(prompt))
            .send()
            .await
            .map_err(|e| transport(route, e, fallback))?;

        let body: ImageUrlResponse = read_json(response, route, fallback).await?;
        if body.image_url.trim().is_empty() {
            return Err(ServiceError::Empty(fallback.to_string()));
        }
        Ok(body.image_url)
    }
}

fn transport(route: &str, err: reqwest::Error, fallback: &str) -> ServiceError {
    warn!(%route, error = %err, "request to menu server failed");
    ServiceError::Transport(fallback.to_string())
}

/// Decodes a success body, or turns an error status into its `{ error }` text.
async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    route: &str,
    fallback: &str,
) -> Result<T, ServiceError> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| transport(route, e, fallback))?;

    if !status.is_success() {
        return Err(remote_error(status, &body, fallback));
    }

    serde_json::from_slice(&body).map_err(|e| {
        debug!(%route, error = %e, "unexpected response body");
        ServiceError::BadResponse(fallback.to_string())
    })
}

fn remote_error(status: StatusCode, body: &[u8], fallback: &str) -> ServiceError {
    let message = serde_json::from_slice::<ApiError>(body)
        .ok()
        .map(|payload| payload.error)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string());
    ServiceError::Remote {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl MenuBackend for HttpMenuBackend {
    async fn extract_menu(&self, upload: &MenuUpload) -> Result<Vec<MenuItem>, ServiceError> {
        let part = Part::bytes(upload.bytes.clone()).file_name(upload.filename.clone());
        let part = match upload.mime_type.as_deref() {
            Some(mime) => part
                .mime_str(mime)
                .map_err(|e| ServiceError::Transport(format!("invalid mime type {mime}: {e}")))?,
            None => part,
        };
        let form = Form::new().part(UPLOAD_FILE_FIELD, part);

        let response = self
            .http
            .post(self.url(UPLOAD_ROUTE))
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport(UPLOAD_ROUTE, e, EXTRACT_FAILED))?;

        let body: MenuItemsResponse = read_json(response, UPLOAD_ROUTE, EXTRACT_FAILED).await?;
        Ok(body.menu_items)
    }

    async fn search_image(&self, query: &str) -> Result<String, ServiceError> {
        self.post_prompt(SEARCH_IMAGE_ROUTE, query, FIND_FAILED).await
    }

    async fn generate_image(&self, prompt: &str) -> Result<String, ServiceError> {
        self.post_prompt(GENERATE_IMAGE_ROUTE, prompt, GENERATE_FAILED)
            .await
    }
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
