use std::sync::Arc;

use ai_integration::{
    GoogleImageSearch, GoogleSearchConfig, ImageGenerator, ImageSearch, MenuReader,
    MissingImageApi, MissingImageSearch, OpenAiClient, OpenAiConfig,
};
use anyhow::Context;
use server_api::ApiContext;
use tracing::warn;

use crate::config::Settings;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
}

impl AppState {
    /// Wires the upstream clients; absent credentials become stand-ins that fail with a
    /// configuration error on every call instead of aborting startup.
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let (menu_reader, image_generator): (Arc<dyn MenuReader>, Arc<dyn ImageGenerator>) =
            match &settings.image_api_key {
                Some(api_key) => {
                    let config = OpenAiConfig {
                        api_key: api_key.clone(),
                        base_url: settings.openai_base_url.clone(),
                        vision_model: settings.vision_model.clone(),
                        image_model: settings.image_model.clone(),
                        timeout: settings.upstream_timeout(),
                    };
                    let client =
                        Arc::new(OpenAiClient::new(config).context("failed to build OpenAI client")?);
                    (client.clone(), client)
                }
                None => {
                    warn!("IMAGE_API_KEY is not configured; upload and generate will fail");
                    (Arc::new(MissingImageApi), Arc::new(MissingImageApi))
                }
            };

        let image_search: Arc<dyn ImageSearch> =
            match (&settings.search_api_key, &settings.search_engine_id) {
                (Some(api_key), Some(engine_id)) => {
                    let mut config = GoogleSearchConfig::new(api_key.clone(), engine_id.clone())
                        .with_base_url(settings.search_base_url.clone());
                    config.timeout = settings.upstream_timeout();
                    Arc::new(
                        GoogleImageSearch::new(config)
                            .context("failed to build image search client")?,
                    )
                }
                _ => {
                    warn!("Google API key or CX is not configured; image search will fail");
                    Arc::new(MissingImageSearch)
                }
            };

        Ok(Self {
            api: ApiContext {
                menu_reader,
                image_search,
                image_generator,
            },
        })
    }
}
