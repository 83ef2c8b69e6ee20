//! Configuration management for aio-chat
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Main configuration structure for aio-chat
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Conversation storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Language model gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// Which key-value backend holds conversations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Embedded sled database
    #[default]
    Sled,
    /// SQLite file with a single key-value table
    Sqlite,
    /// Process memory; nothing survives exit
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = ChatError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sled" => Ok(StorageBackend::Sled),
            "sqlite" => Ok(StorageBackend::Sqlite),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(ChatError::Config(format!(
                "Invalid storage backend: {}. Must be one of: sled, sqlite, memory",
                other
            ))),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend to use
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory holding the database files (platform data dir when unset)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Language model gateway configuration
///
/// Defaults target Groq's OpenAI-compatible endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used when a request names none
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Model used by the connection check
    #[serde(default = "default_check_model")]
    pub check_model: String,

    /// Upper bound on generated tokens per reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// HTTP timeout for a whole request (seconds)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_api_base() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_model() -> String {
    "llama-3.1-70b-versatile".to_string()
}

fn default_check_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_temperature() -> f64 {
    0.7
}

fn default_timeout_seconds() -> u64 {
    120
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            check_model: default_check_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl GatewayConfig {
    /// Read the API key from the configured environment variable
    ///
    /// Empty values count as missing.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the gateway server listens on
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file yields the defaults. Environment variables override
    /// the file, and CLI flags override both.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed, or an
    /// environment override holds an invalid value
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars()?;
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ChatError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ChatError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) -> Result<()> {
        if let Ok(backend) = std::env::var("AIO_CHAT_STORAGE_BACKEND") {
            self.storage.backend = backend.parse()?;
        }

        if let Ok(data_dir) = std::env::var("AIO_CHAT_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(data_dir));
        }

        if let Ok(api_base) = std::env::var("AIO_CHAT_API_BASE") {
            self.gateway.api_base = api_base;
        }

        if let Ok(model) = std::env::var("AIO_CHAT_MODEL") {
            self.gateway.default_model = model;
        }

        if let Ok(bind) = std::env::var("AIO_CHAT_BIND") {
            self.server.bind = bind;
        }

        Ok(())
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(dir) = &cli.data_dir {
            tracing::info!("Using data directory override from CLI: {}", dir.display());
            self.storage.data_dir = Some(dir.clone());
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any value is outside its accepted range
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.gateway.api_base).map_err(|e| {
            ChatError::Config(format!(
                "gateway.api_base is not a valid URL ({}): {}",
                self.gateway.api_base, e
            ))
        })?;

        if self.gateway.api_key_env.trim().is_empty() {
            return Err(
                ChatError::Config("gateway.api_key_env cannot be empty".to_string()).into(),
            );
        }

        if self.gateway.default_model.trim().is_empty() {
            return Err(
                ChatError::Config("gateway.default_model cannot be empty".to_string()).into(),
            );
        }

        if self.gateway.max_tokens == 0 {
            return Err(ChatError::Config(
                "gateway.max_tokens must be greater than 0".to_string(),
            )
            .into());
        }

        if !(0.0..=2.0).contains(&self.gateway.temperature) {
            return Err(ChatError::Config(
                "gateway.temperature must be between 0.0 and 2.0".to_string(),
            )
            .into());
        }

        if self.gateway.timeout_seconds == 0 {
            return Err(ChatError::Config(
                "gateway.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        self.server.bind.parse::<SocketAddr>().map_err(|e| {
            ChatError::Config(format!(
                "server.bind is not a valid socket address ({}): {}",
                self.server.bind, e
            ))
        })?;

        Ok(())
    }
}
