pub mod validation;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use self::validation::validate_config;
use crate::protocol::canonical::BackendKind;

/// Environment variable naming an alternative config file path.
pub const CONFIG_PATH_ENV: &str = "CHATRELAY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid environment override {name}: {message}")]
    Env { name: &'static str, message: String },
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_http_pool_max_idle_per_host")]
    pub http_pool_max_idle_per_host: usize,
    #[serde(default = "default_http_pool_idle_timeout_secs")]
    pub http_pool_idle_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_worker_threads: Option<usize>,
    #[serde(default)]
    pub base_path: String,
    #[serde(default)]
    pub http_use_env_proxy: bool,
    #[serde(default = "default_cors_allow_origin")]
    pub cors_allow_origin: String,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_timeout() -> u64 {
    180
}
fn default_http_pool_max_idle_per_host() -> usize {
    16
}
fn default_http_pool_idle_timeout_secs() -> u64 {
    15
}
fn default_cors_allow_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            timeout: default_timeout(),
            http_pool_max_idle_per_host: default_http_pool_max_idle_per_host(),
            http_pool_idle_timeout_secs: default_http_pool_idle_timeout_secs(),
            runtime_worker_threads: None,
            base_path: String::new(),
            http_use_env_proxy: false,
            cors_allow_origin: default_cors_allow_origin(),
        }
    }
}

/// Which upstream the relay talks to, with its credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Single-shot completion API authenticated with `x-api-key`.
    Completion {
        #[serde(default = "default_completion_base_url")]
        base_url: String,
        #[serde(default)]
        api_key: String,
        #[serde(default)]
        proxy: Option<String>,
    },
    /// Cumulative-text SSE bridge authenticated with `{channel}@{token}`.
    CumulativeSse {
        base_url: String,
        #[serde(default)]
        channel_id: String,
        #[serde(default)]
        access_token: String,
        #[serde(default)]
        proxy: Option<String>,
    },
    /// Incremental push API talking to a named bot.
    Push {
        base_url: String,
        #[serde(default)]
        token: String,
        #[serde(default = "default_push_bot")]
        bot: String,
        #[serde(default)]
        proxy: Option<String>,
    },
}

fn default_completion_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_push_bot() -> String {
    "a2".to_string()
}

impl BackendConfig {
    #[must_use]
    pub fn base_url(&self) -> &str {
        match self {
            BackendConfig::Completion { base_url, .. }
            | BackendConfig::CumulativeSse { base_url, .. }
            | BackendConfig::Push { base_url, .. } => base_url,
        }
    }

    #[must_use]
    pub fn proxy(&self) -> Option<&str> {
        match self {
            BackendConfig::Completion { proxy, .. }
            | BackendConfig::CumulativeSse { proxy, .. }
            | BackendConfig::Push { proxy, .. } => proxy.as_deref().filter(|p| !p.is_empty()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::Completion { .. } => BackendKind::Completion,
            BackendConfig::CumulativeSse { .. } => BackendKind::CumulativeSse,
            BackendConfig::Push { .. } => BackendKind::Push,
        }
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        self.kind().as_str()
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Completion {
            base_url: default_completion_base_url(),
            api_key: String::new(),
            proxy: None,
        }
    }
}

/// Canonical-to-backend model name table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_model_map")]
    pub map: FxHashMap<String, String>,
    #[serde(default = "default_fallback_model")]
    pub fallback: String,
}

fn default_model_map() -> FxHashMap<String, String> {
    [
        ("gpt-3.5-turbo", "claude-instant-v1"),
        ("gpt-3.5-turbo-0301", "claude-instant-v1"),
        ("gpt-3.5-turbo-16k", "claude-instant-v1-100k"),
        ("gpt-4", "claude-v1.3"),
        ("gpt-4-0314", "claude-v1.3"),
        ("gpt-4-32k", "claude-v1.3-100k"),
    ]
    .into_iter()
    .map(|(canonical, backend)| (canonical.to_string(), backend.to_string()))
    .collect()
}
fn default_fallback_model() -> String {
    "claude-v1.3-100k".to_string()
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            map: default_model_map(),
            fallback: default_fallback_model(),
        }
    }
}

/// Log output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

/// Load configuration from a YAML file, apply environment overrides and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, [`ConfigError::Env`] when an override cannot be parsed,
/// or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let mut config: AppConfig = serde_yaml::from_str(&contents)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config)?;
    Ok(config)
}

/// Overlay process environment values on top of the parsed file.
///
/// `lookup` is injected so tests never touch the real environment.
///
/// # Errors
///
/// Returns [`ConfigError::Env`] when `PORT` is not a valid port number.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    if let Some(host) = lookup("HOST") {
        config.server.host = host;
    }
    if let Some(port) = lookup("PORT") {
        config.server.port = port.trim().parse().map_err(|err| ConfigError::Env {
            name: "PORT",
            message: format!("{err}"),
        })?;
    }
    if let Some(level) = lookup("LOG_LEVEL") {
        config.features.log_level = level;
    }

    match &mut config.backend {
        BackendConfig::Completion {
            base_url, api_key, ..
        } => {
            if let Some(value) = lookup("BACKEND_BASE_URL") {
                *base_url = value;
            }
            if let Some(value) = lookup("BACKEND_API_KEY") {
                *api_key = value;
            }
        }
        BackendConfig::CumulativeSse {
            base_url,
            channel_id,
            access_token,
            ..
        } => {
            if let Some(value) = lookup("BACKEND_BASE_URL") {
                *base_url = value;
            }
            if let Some(value) = lookup("BACKEND_CHANNEL") {
                *channel_id = value;
            }
            if let Some(value) = lookup("BACKEND_ACCESS_TOKEN") {
                *access_token = value;
            }
        }
        BackendConfig::Push {
            base_url, token, ..
        } => {
            if let Some(value) = lookup("BACKEND_BASE_URL") {
                *base_url = value;
            }
            if let Some(value) = lookup("BACKEND_TOKEN") {
                *token = value;
            }
        }
    }
    Ok(())
}
