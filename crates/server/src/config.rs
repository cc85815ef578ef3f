use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// Optional `server.{toml,json,yaml}` in the working directory.
const CONFIG_FILE: &str = "server";
const ENV_PREFIX: &str = "APP";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bind_addr: String,
    pub image_api_key: Option<String>,
    pub search_api_key: Option<String>,
    pub search_engine_id: Option<String>,
    pub openai_base_url: String,
    pub search_base_url: String,
    pub vision_model: String,
    pub image_model: String,
    pub max_upload_bytes: usize,
    pub upstream_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            image_api_key: None,
            search_api_key: None,
            search_engine_id: None,
            openai_base_url: ai_integration::openai::DEFAULT_BASE_URL.into(),
            search_base_url: ai_integration::google_search::DEFAULT_BASE_URL.into(),
            vision_model: ai_integration::openai::DEFAULT_VISION_MODEL.into(),
            image_model: ai_integration::openai::DEFAULT_IMAGE_MODEL.into(),
            max_upload_bytes: 20 * 1024 * 1024,
            upstream_timeout_secs: 120,
        }
    }
}

/// Keys accepted from the config file and `APP__*` environment variables.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SettingsOverrides {
    pub(crate) bind_addr: Option<String>,
    pub(crate) image_api_key: Option<String>,
    pub(crate) search_api_key: Option<String>,
    pub(crate) search_engine_id: Option<String>,
    pub(crate) openai_base_url: Option<String>,
    pub(crate) search_base_url: Option<String>,
    pub(crate) vision_model: Option<String>,
    pub(crate) image_model: Option<String>,
    pub(crate) max_upload_bytes: Option<usize>,
    pub(crate) upstream_timeout_secs: Option<u64>,
}

impl Settings {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub(crate) fn apply(&mut self, overrides: SettingsOverrides) {
        if let Some(v) = non_blank(overrides.bind_addr) {
            self.bind_addr = v;
        }
        if let Some(v) = non_blank(overrides.image_api_key) {
            self.image_api_key = Some(v);
        }
        if let Some(v) = non_blank(overrides.search_api_key) {
            self.search_api_key = Some(v);
        }
        if let Some(v) = non_blank(overrides.search_engine_id) {
            self.search_engine_id = Some(v);
        }
        if let Some(v) = non_blank(overrides.openai_base_url) {
            self.openai_base_url = v;
        }
        if let Some(v) = non_blank(overrides.search_base_url) {
            self.search_base_url = v;
        }
        if let Some(v) = non_blank(overrides.vision_model) {
            self.vision_model = v;
        }
        if let Some(v) = non_blank(overrides.image_model) {
            self.image_model = v;
        }
        if let Some(v) = overrides.max_upload_bytes {
            self.max_upload_bytes = v;
        }
        if let Some(v) = overrides.upstream_timeout_secs {
            self.upstream_timeout_secs = v;
        }
    }

    /// Plain variable names the deployment docs use for the secrets.
    pub(crate) fn apply_legacy_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = non_blank(lookup("SERVER_BIND")) {
            self.bind_addr = v;
        }
        if let Some(v) = non_blank(lookup("IMAGE_API_KEY")) {
            self.image_api_key = Some(v);
        }
        if let Some(v) = non_blank(lookup("GOOGLE_API_KEY")) {
            self.search_api_key = Some(v);
        }
        if let Some(v) = non_blank(lookup("GOOGLE_CX")) {
            self.search_engine_id = Some(v);
        }
    }
}

/// Defaults, then `server.*`, then the plain variable names, then `APP__*`; later
/// layers win.
pub fn load_settings() -> anyhow::Result<Settings> {
    let file = read_overrides(
        ::config::File::with_name(CONFIG_FILE).required(false),
        "server configuration file",
    )?;
    let env = read_overrides(
        ::config::Environment::with_prefix(ENV_PREFIX).separator("__"),
        "APP__ environment",
    )?;
    Ok(resolve(file, env, |name| std::env::var(name).ok()))
}

pub(crate) fn resolve(
    file: SettingsOverrides,
    env: SettingsOverrides,
    legacy: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();
    settings.apply(file);
    settings.apply_legacy_env(legacy);
    settings.apply(env);
    settings
}

fn read_overrides<S>(source: S, what: &str) -> anyhow::Result<SettingsOverrides>
where
    S: ::config::Source + Send + Sync + 'static,
{
    ::config::Config::builder()
        .add_source(source)
        .build()
        .with_context(|| format!("failed to read {what}"))?
        .try_deserialize()
        .with_context(|| format!("invalid {what}"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
