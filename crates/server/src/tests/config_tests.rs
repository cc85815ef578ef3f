use super::*;

use std::collections::HashMap;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

#[test]
fn defaults_leave_credentials_unset() {
    let settings = Settings::default();
    assert_eq!(settings.image_api_key, None);
    assert_eq!(settings.search_api_key, None);
    assert_eq!(settings.search_engine_id, None);
    assert_eq!(settings.image_model, "dall-e-2");
    assert_eq!(settings.max_upload_bytes, 20 * 1024 * 1024);
}

#[test]
fn overrides_replace_defaults_and_skip_blanks() {
    let mut settings = Settings::default();
    settings.apply(SettingsOverrides {
        bind_addr: Some("0.0.0.0:9000".into()),
        image_api_key: Some("   ".into()),
        search_engine_id: Some(" engine ".into()),
        max_upload_bytes: Some(1024),
        ..SettingsOverrides::default()
    });

    assert_eq!(settings.bind_addr, "0.0.0.0:9000");
    assert_eq!(settings.image_api_key, None);
    assert_eq!(settings.search_engine_id.as_deref(), Some("engine"));
    assert_eq!(settings.max_upload_bytes, 1024);
}

#[test]
fn legacy_names_fill_secrets() {
    let mut settings = Settings::default();
    settings.apply_legacy_env(lookup(&[
        ("IMAGE_API_KEY", "sk-live"),
        ("GOOGLE_API_KEY", "gkey"),
        ("GOOGLE_CX", "cx-1"),
        ("SERVER_BIND", "127.0.0.1:4000"),
    ]));

    assert_eq!(settings.image_api_key.as_deref(), Some("sk-live"));
    assert_eq!(settings.search_api_key.as_deref(), Some("gkey"));
    assert_eq!(settings.search_engine_id.as_deref(), Some("cx-1"));
    assert_eq!(settings.bind_addr, "127.0.0.1:4000");
}

#[test]
fn layered_source_deserializes_overrides() {
    let layered = ::config::Config::builder()
        .set_override("search_api_key", "from-file")
        .expect("override")
        .set_override("upstream_timeout_secs", 5)
        .expect("override")
        .build()
        .expect("config");
    let overrides: SettingsOverrides = layered.try_deserialize().expect("deserialize");

    let mut settings = Settings::default();
    settings.apply(overrides);
    assert_eq!(settings.search_api_key.as_deref(), Some("from-file"));
    assert_eq!(settings.upstream_timeout(), Duration::from_secs(5));
}

#[test]
fn prefixed_env_beats_plain_names_which_beat_the_file() {
    let file = SettingsOverrides {
        bind_addr: Some("0.0.0.0:7000".into()),
        image_api_key: Some("from-file".into()),
        search_engine_id: Some("cx-file".into()),
        ..SettingsOverrides::default()
    };
    let env = SettingsOverrides {
        bind_addr: Some("0.0.0.0:9000".into()),
        ..SettingsOverrides::default()
    };

    let settings = resolve(
        file,
        env,
        lookup(&[("SERVER_BIND", "127.0.0.1:4000"), ("IMAGE_API_KEY", "sk-legacy")]),
    );

    assert_eq!(settings.bind_addr, "0.0.0.0:9000");
    assert_eq!(settings.image_api_key.as_deref(), Some("sk-legacy"));
    assert_eq!(settings.search_engine_id.as_deref(), Some("cx-file"));
}
