use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SwitchyardError};

/// Top-level Switchyard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_workspace")]
    pub workspace: String,
    /// Generation backend. Absent means the offline generator is used.
    #[serde(default)]
    pub model: Option<ModelConfig>,
    /// Web search backend. Absent means every search fails (and degrades).
    #[serde(default)]
    pub web_search: Option<WebSearchConfig>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub log: Option<LogConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            model: None,
            web_search: None,
            store: StoreConfig::default(),
            gateway: GatewayConfig::default(),
            worker: WorkerConfig::default(),
            checkpoint: CheckpointConfig::default(),
            log: None,
        }
    }
}

fn default_workspace() -> String { "~/.switchyard".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Set to false to keep the section but run without a model.
    #[serde(default = "default_model_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            enabled: default_model_enabled(),
            retry: None,
        }
    }
}

fn default_provider() -> String { "openai".to_string() }
fn default_model_id() -> String { "gpt-4.1".to_string() }
fn default_max_tokens() -> u32 { 4096 }
fn default_temperature() -> f32 { 0.0 }
fn default_model_enabled() -> bool { true }

/// Retry configuration for generation requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default = "default_search_provider")]
    pub provider: String,
    pub api_key: String,
    /// Programmable Search Engine id (Google only).
    #[serde(default)]
    pub engine_id: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_search_provider() -> String { "google".to_string() }

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path. Default: <workspace>/trajectories.db
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_bind() -> String { "127.0.0.1:8000".to_string() }
fn default_allowed_origins() -> Vec<String> { vec!["http://localhost".to_string()] }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_concurrency() -> usize { 2 }
fn default_queue_capacity() -> usize { 1024 }

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Checkpoint retention configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default)]
    pub backend: CheckpointBackend,
    /// Maximum number of task snapshots retained before eviction.
    #[serde(default = "default_checkpoint_entries")]
    pub max_entries: usize,
    /// Database path for the sqlite backend. Default: <workspace>/checkpoints.db
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backend: CheckpointBackend::default(),
            max_entries: default_checkpoint_entries(),
            path: None,
        }
    }
}

fn default_checkpoint_entries() -> usize { 1024 }

/// JSONL run logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Enable run logging (default: true when section is present).
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// Directory for log files. Default: <workspace>/logs
    #[serde(default)]
    pub log_dir: Option<String>,
    /// 1 = task lifecycle only, 2 = also node visits and degraded searches.
    #[serde(default = "default_log_level")]
    pub level: u8,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: None,
            level: default_log_level(),
        }
    }
}

fn default_log_enabled() -> bool { true }
fn default_log_level() -> u8 { 2 }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| SwitchyardError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        let config: AppConfig =
            toml::from_str(&expanded).map_err(|e| SwitchyardError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from environment variables only.
    pub fn from_env() -> Result<Self> {
        let mut config = AppConfig::default();

        let use_llm = std::env::var("SWITCHYARD_USE_LLM")
            .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.model = Some(ModelConfig {
                api_key: Some(key),
                enabled: use_llm,
                ..ModelConfig::default()
            });
        }

        if let (Ok(key), Ok(cx)) = (
            std::env::var("GOOGLE_API_KEY"),
            std::env::var("GOOGLE_CSE_ID"),
        ) {
            config.web_search = Some(WebSearchConfig {
                provider: "google".to_string(),
                api_key: key,
                engine_id: Some(cx),
                base_url: None,
            });
        } else if let Ok(key) = std::env::var("TAVILY_API_KEY") {
            config.web_search = Some(WebSearchConfig {
                provider: "tavily".to_string(),
                api_key: key,
                engine_id: None,
                base_url: None,
            });
        }

        if let Ok(path) = std::env::var("SWITCHYARD_STORE_PATH") {
            config.store.path = Some(path);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot work at runtime.
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.store.path {
            if path.trim().is_empty() {
                return Err(SwitchyardError::Config("store.path must not be empty".into()));
            }
        }
        if let Some(search) = &self.web_search {
            if search.provider == "google" && search.engine_id.is_none() {
                return Err(SwitchyardError::Config(
                    "web_search.engine_id is required for the google provider".into(),
                ));
            }
        }
        if self.worker.concurrency == 0 {
            return Err(SwitchyardError::Config("worker.concurrency must be at least 1".into()));
        }
        Ok(())
    }

    /// The model config, if one is present and enabled.
    pub fn active_model(&self) -> Option<&ModelConfig> {
        self.model.as_ref().filter(|m| m.enabled)
    }

    /// Resolve the workspace directory (expand ~).
    pub fn workspace_dir(&self) -> PathBuf {
        expand_home(&self.workspace)
    }

    pub fn store_path(&self) -> PathBuf {
        match &self.store.path {
            Some(p) => expand_home(p),
            None => self.workspace_dir().join("trajectories.db"),
        }
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        match &self.checkpoint.path {
            Some(p) => expand_home(p),
            None => self.workspace_dir().join("checkpoints.db"),
        }
    }

    pub fn log_dir(&self) -> Option<PathBuf> {
        let log = self.log.as_ref().filter(|l| l.enabled)?;
        Some(match &log.log_dir {
            Some(dir) => expand_home(dir),
            None => self.workspace_dir().join("logs"),
        })
    }

    /// Copy of this config with every secret masked, for display.
    pub fn masked(&self) -> Self {
        let mut copy = self.clone();
        if let Some(model) = copy.model.as_mut() {
            model.api_key = model.api_key.as_deref().map(mask_secret);
        }
        if let Some(search) = copy.web_search.as_mut() {
            search.api_key = mask_secret(&search.api_key);
        }
        copy
    }
}

/// Mask a secret as `****` plus its last four characters.
///
/// Boolean-looking values are shown as-is; short values are fully masked.
pub fn mask_secret(value: &str) -> String {
    let lower = value.to_ascii_lowercase();
    if lower == "true" || lower == "false" {
        return lower;
    }
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 4 {
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("****{}", tail)
    } else {
        "********".to_string()
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
