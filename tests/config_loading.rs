use std::io::Write;

use switchyard_core::config::{AppConfig, CheckpointBackend};
use switchyard_core::error::SwitchyardError;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
workspace = "/tmp/switchyard-test"

[model]
provider = "openai"
model_id = "gpt-4.1-mini"
api_key = "sk-test-key-1234"
base_url = "http://localhost:11434/v1/chat/completions"
max_tokens = 2048
temperature = 0.2

[model.retry]
max_retries = 5
initial_backoff_ms = 250
max_backoff_ms = 8000

[web_search]
provider = "google"
api_key = "google-key-abcd"
engine_id = "cse-123"

[store]
path = "/tmp/switchyard-test/runs.db"

[gateway]
bind = "0.0.0.0:9999"
allowed_origins = ["http://localhost:3000", "https://app.example.com"]

[worker]
concurrency = 8
queue_capacity = 64

[checkpoint]
backend = "sqlite"
max_entries = 50

[log]
level = 1
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    let model = config.active_model().expect("model enabled");
    assert_eq!(model.model_id, "gpt-4.1-mini");
    assert_eq!(model.max_tokens, 2048);
    assert_eq!(model.retry.as_ref().map(|r| r.max_retries), Some(5));

    let search = config.web_search.as_ref().expect("web search");
    assert_eq!(search.engine_id.as_deref(), Some("cse-123"));

    assert_eq!(
        config.store_path().to_str(),
        Some("/tmp/switchyard-test/runs.db")
    );
    assert_eq!(config.gateway.bind, "0.0.0.0:9999");
    assert_eq!(config.gateway.allowed_origins.len(), 2);
    assert_eq!(config.worker.concurrency, 8);
    assert_eq!(config.worker.queue_capacity, 64);
    assert_eq!(config.checkpoint.backend, CheckpointBackend::Sqlite);
    assert_eq!(config.checkpoint.max_entries, 50);
    assert_eq!(
        config.checkpoint_path().to_str(),
        Some("/tmp/switchyard-test/checkpoints.db")
    );
    assert_eq!(
        config.log_dir().and_then(|p| p.to_str().map(String::from)),
        Some("/tmp/switchyard-test/logs".to_string())
    );
}

#[test]
fn test_minimal_config_uses_defaults() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"workspace = \"/tmp/sy-min\"\n").expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert!(config.active_model().is_none());
    assert!(config.web_search.is_none());
    assert!(config.log_dir().is_none());
    assert_eq!(config.gateway.bind, "127.0.0.1:8000");
    assert_eq!(config.gateway.allowed_origins, vec!["http://localhost"]);
    assert_eq!(config.worker.concurrency, 2);
    assert_eq!(config.checkpoint.backend, CheckpointBackend::Memory);
    assert_eq!(config.checkpoint.max_entries, 1024);
    assert_eq!(config.store_path().to_str(), Some("/tmp/sy-min/trajectories.db"));
}

#[test]
fn test_disabled_model_is_inactive() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[model]\napi_key = \"sk-abc\"\nenabled = false\n")
        .expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert!(config.model.is_some());
    assert!(config.active_model().is_none());
}

#[test]
fn test_env_var_expansion() {
    std::env::set_var("SWITCHYARD_TEST_CFG_KEY", "sk-from-env-9876");
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[model]\napi_key = \"${SWITCHYARD_TEST_CFG_KEY}\"\n")
        .expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(
        config.model.and_then(|m| m.api_key).as_deref(),
        Some("sk-from-env-9876")
    );
}

#[test]
fn test_google_without_engine_id_rejected() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[web_search]\napi_key = \"k\"\n").expect("write toml");

    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert!(matches!(err, SwitchyardError::Config(_)));
}

#[test]
fn test_empty_store_path_rejected() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[store]\npath = \"\"\n").expect("write toml");

    assert!(matches!(
        AppConfig::load(tmp.path()),
        Err(SwitchyardError::Config(_))
    ));
}

#[test]
fn test_missing_file_is_not_found() {
    let err = AppConfig::load(std::path::Path::new("/nonexistent/switchyard.toml")).unwrap_err();
    assert!(matches!(err, SwitchyardError::ConfigNotFound(_)));
}

#[test]
fn test_masked_config_hides_secrets() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(
        b"[model]\napi_key = \"sk-secret-value-WXYZ\"\n\n\
          [web_search]\nprovider = \"tavily\"\napi_key = \"tvly-key-1234\"\n",
    )
    .expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    let rendered = toml::to_string_pretty(&config.masked()).expect("render");
    assert!(rendered.contains("****WXYZ"));
    assert!(rendered.contains("****1234"));
    assert!(!rendered.contains("sk-secret-value"));
    assert!(!rendered.contains("tvly-key"));
}
