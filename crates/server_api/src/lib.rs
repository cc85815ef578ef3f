use std::sync::Arc;

use ai_integration::{ImageGenerator, ImageSearch, IntegrationError, MenuImage, MenuReader};
use shared::{
    error::{ApiException, ErrorCode},
    protocol::{ImagePromptRequest, ImageUrlResponse, MenuItemsResponse},
};
use tracing::{error, info};

pub const NO_FILE_UPLOADED: &str = "No file uploaded.";
pub const SEARCH_QUERY_REQUIRED: &str = "Search query is required.";
pub const PROMPT_REQUIRED: &str = "Prompt is required.";
pub const PROCESS_IMAGE_FAILED: &str = "Failed to process image.";
pub const SEARCH_FAILED: &str = ai_integration::google_search::SEARCH_FAILED;
pub const GENERATE_FAILED: &str = "Failed to generate image.";

#[derive(Clone)]
pub struct ApiContext {
    pub menu_reader: Arc<dyn MenuReader>,
    pub image_search: Arc<dyn ImageSearch>,
    pub image_generator: Arc<dyn ImageGenerator>,
}

pub async fn extract_menu(
    ctx: &ApiContext,
    image: Option<MenuImage>,
) -> Result<MenuItemsResponse, ApiException> {
    let image = image
        .filter(|image| !image.bytes.is_empty())
        .ok_or_else(|| ApiException::validation(NO_FILE_UPLOADED))?;

    info!(
        bytes = image.bytes.len(),
        mime_type = %image.mime_type,
        "extracting menu items from upload"
    );
    let menu_items = ctx.menu_reader.read_menu(&image).await.map_err(|err| {
        error!(error = %err, "menu extraction failed");
        match err {
            IntegrationError::Configuration(message) => ApiException::configuration(message),
            IntegrationError::BadResponse(message) => {
                ApiException::new(ErrorCode::BadResponse, message)
            }
            other => ApiException::new(
                ErrorCode::Upstream,
                non_empty_or(other.user_message(), PROCESS_IMAGE_FAILED),
            ),
        }
    })?;

    info!(count = menu_items.len(), "parsed menu items from image");
    Ok(MenuItemsResponse { menu_items })
}

pub async fn search_image(
    ctx: &ApiContext,
    request: &ImagePromptRequest,
) -> Result<ImageUrlResponse, ApiException> {
    let query = request
        .trimmed_prompt()
        .ok_or_else(|| ApiException::validation(SEARCH_QUERY_REQUIRED))?;

    info!(%query, "searching for image");
    let image_url = ctx.image_search.top_image(query).await.map_err(|err| {
        match err {
            IntegrationError::Configuration(message) => {
                error!(%message, "image search is not configured");
                ApiException::configuration(message)
            }
            IntegrationError::NotFound(message) => {
                info!(%query, "no image found");
                ApiException::new(ErrorCode::NotFound, message)
            }
            other => {
                error!(error = %other, "image search failed");
                ApiException::new(
                    ErrorCode::Upstream,
                    non_empty_or(other.user_message(), SEARCH_FAILED),
                )
            }
        }
    })?;

    Ok(ImageUrlResponse { image_url })
}

pub async fn generate_image(
    ctx: &ApiContext,
    request: &ImagePromptRequest,
) -> Result<ImageUrlResponse, ApiException> {
    let prompt = request
        .trimmed_prompt()
        .ok_or_else(|| ApiException::validation(PROMPT_REQUIRED))?;

    info!(%prompt, "generating image");
    let image_url = ctx
        .image_generator
        .generate(prompt)
        .await
        .map_err(|err| {
            error!(error = %err, "image generation failed");
            match err {
                IntegrationError::Configuration(message) => ApiException::configuration(message),
                _ => ApiException::new(ErrorCode::Upstream, GENERATE_FAILED),
            }
        })?;

    info!("generated image");
    Ok(ImageUrlResponse { image_url })
}

fn non_empty_or(message: String, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
