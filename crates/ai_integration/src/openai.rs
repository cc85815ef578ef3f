use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use shared::domain::MenuItem;
use tracing::{debug, info};

use crate::{
    menu_parse::parse_menu_content, upstream_error_message, ImageGenerator, IntegrationError,
    MenuImage, MenuReader,
};

const SERVICE: &str = "openai";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o";
pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-2";
pub const GENERATED_IMAGE_SIZE: &str = "256x256";

const MENU_ANALYST_PROMPT: &str = "\
You are an expert menu analyst. Your task is to analyze the following image of a restaurant menu and convert it into a structured JSON format.
The output must be a single JSON object with one key: \"menuItems\".
The value of \"menuItems\" must be an array of objects, where each object represents a single menu item.
Each menu item object must have two fields: \"title\" and \"description\".

- \"title\": The name of the dish.
- \"description\": The descriptive text for the dish. If there is no description, use an empty string.

Analyze the layout, font sizes, and structure of the menu in the image to accurately distinguish titles from descriptions.
Your response must be only the JSON object, with no other text, explanations, or markdown formatting.";

/// Wraps a dish prompt in the fixed photographic template.
pub fn photo_prompt(dish: &str) -> String {
    format!(
        "A high-quality, appetizing photo of {dish}, on a clean plate, in a restaurant setting."
    )
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub vision_model: String,
    pub image_model: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            vision_model: DEFAULT_VISION_MODEL.into(),
            image_model: DEFAULT_IMAGE_MODEL.into(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

pub struct OpenAiClient {
    http: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, IntegrationError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| IntegrationError::Transport {
                service: SERVICE,
                source,
            })?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, IntegrationError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.endpoint(path))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|source| IntegrationError::Transport {
                service: SERVICE,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = upstream_error_message(&body)
                .unwrap_or_else(|| format!("OpenAI request failed with status {status}"));
            return Err(IntegrationError::Upstream {
                service: SERVICE,
                status: status.as_u16(),
                message,
            });
        }

        response.json::<R>().await.map_err(|e| {
            IntegrationError::BadResponse(format!("failed to decode OpenAI response: {e}"))
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct ImageGenerationRequest<'a> {
    model: &'a str,
    prompt: String,
    n: u8,
    size: &'static str,
}

#[derive(Deserialize)]
struct ImageGenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Deserialize)]
struct GeneratedImage {
    url: Option<String>,
}

pub(crate) fn data_url(image: &MenuImage) -> String {
    format!(
        "data:{};base64,{}",
        image.mime_type,
        STANDARD.encode(&image.bytes)
    )
}

#[async_trait]
impl MenuReader for OpenAiClient {
    async fn read_menu(&self, image: &MenuImage) -> Result<Vec<MenuItem>, IntegrationError> {
        let request = ChatRequest {
            model: &self.config.vision_model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: MENU_ANALYST_PROMPT,
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: data_url(image),
                        },
                    },
                ],
            }],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        debug!(
            model = %self.config.vision_model,
            bytes = image.bytes.len(),
            mime_type = %image.mime_type,
            "calling vision model"
        );
        let response: ChatResponse = self.post_json("chat/completions", &request).await?;
        info!("vision model call complete");

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| IntegrationError::BadResponse("AI returned empty content.".into()))?;

        parse_menu_content(&content)
    }
}

#[async_trait]
impl ImageGenerator for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<String, IntegrationError> {
        let request = ImageGenerationRequest {
            model: &self.config.image_model,
            prompt: photo_prompt(prompt),
            n: 1,
            size: GENERATED_IMAGE_SIZE,
        };

        debug!(model = %self.config.image_model, "requesting generated image");
        let response: ImageGenerationResponse =
            self.post_json("images/generations", &request).await?;

        response
            .data
            .into_iter()
            .next()
            .and_then(|image| image.url)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| IntegrationError::BadResponse("No image URL returned from API.".into()))
    }
}

#[cfg(test)]
#[path = "tests/openai_tests.rs"]
mod tests;
