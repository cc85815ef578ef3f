use serde::{Deserialize, Serialize};

use crate::domain::MenuItem;

pub const UPLOAD_ROUTE: &str = "/api/upload";
pub const SEARCH_IMAGE_ROUTE: &str = "/api/search-image";
pub const GENERATE_IMAGE_ROUTE: &str = "/api/generate-image";

/// Multipart field carrying the menu photo.
pub const UPLOAD_FILE_FIELD: &str = "file";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemsResponse {
    pub menu_items: Vec<MenuItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImagePromptRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

impl ImagePromptRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
        }
    }

    /// The prompt with surrounding whitespace removed, or `None` when it is absent or blank.
    pub fn trimmed_prompt(&self) -> Option<&str> {
        self.prompt
            .as_deref()
            .map(str::trim)
            .filter(|prompt| !prompt.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUrlResponse {
    pub image_url: String,
}
