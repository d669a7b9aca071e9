//! TOML Configuration File Support
//!
//! Configuration for the daemon client, loaded from
//! `~/.config/agentdash/config.toml`.
//!
//! # Configuration Priority
//!
//! Values are loaded with the following priority (highest first):
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [daemon]
//! url = "http://localhost:7777"
//! error_body_limit = 512
//! connect_timeout_ms = 5000
//! request_timeout_ms = 30000
//!
//! [chat]
//! model = "llama3.2"
//! max_context_turns = 20
//! poll_interval_ms = 30
//! channel_capacity = 64
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Tracks where the configuration last changed from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// `[daemon]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonToml {
    /// Base URL of the agent daemon
    pub url: Option<String>,
    /// Bytes of a failed response body to keep for the error message
    pub error_body_limit: Option<usize>,
    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
    /// Whole-request timeout for non-streaming calls in milliseconds
    pub request_timeout_ms: Option<u64>,
}

/// `[chat]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// Model identifier sent with every turn
    pub model: Option<String>,
    /// Prior turns sent as context
    pub max_context_turns: Option<usize>,
    /// Consumer re-check delay when nothing has arrived
    pub poll_interval_ms: Option<u64>,
    /// Bounded chunk queue size
    pub channel_capacity: Option<usize>,
}

/// Complete TOML file layout
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigToml {
    /// Daemon connection settings
    pub daemon: DaemonToml,
    /// Chat pipeline settings
    pub chat: ChatToml,
}

/// Resolved client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the agent daemon
    pub base_url: String,
    /// Model identifier, `None` until configured or discovered
    pub model: Option<String>,
    /// Prior turns sent as context
    pub max_context_turns: usize,
    /// Consumer re-check delay when nothing has arrived
    pub poll_interval: Duration,
    /// Bounded chunk queue size
    pub channel_capacity: usize,
    /// Bytes of a failed response body to keep for the error message
    pub error_body_limit: usize,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Whole-request timeout for non-streaming calls
    pub request_timeout: Duration,
    /// Path of the file that was loaded, if any
    pub config_file_path: Option<PathBuf>,
    /// Where the most recent override came from
    pub source: ConfigSource,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7777".to_string(),
            model: None,
            max_context_turns: 20,
            poll_interval: Duration::from_millis(30),
            channel_capacity: 64,
            error_body_limit: 512,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ClientConfig {
    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "daemon url must start with http:// or https://, got `{}`",
                self.base_url
            )));
        }
        let poll_ms = self.poll_interval.as_millis();
        if !(1..=1000).contains(&poll_ms) {
            return Err(ConfigError::ValidationError(format!(
                "poll interval must be 1-1000 ms, got {poll_ms}"
            )));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "channel capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default configuration file path
///
/// `$XDG_CONFIG_HOME/agentdash/config.toml`
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("agentdash").join("config.toml"))
}

/// Load configuration from the default path plus environment
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path plus environment
///
/// A missing file is not an error; a malformed one is.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ConfigToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, |key| std::env::var(key).ok());
    config.validate()?;

    Ok(config)
}

fn apply_toml_config(config: &mut ClientConfig, toml: &ConfigToml) {
    if let Some(ref url) = toml.daemon.url {
        config.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(limit) = toml.daemon.error_body_limit {
        config.error_body_limit = limit;
    }
    if let Some(ms) = toml.daemon.connect_timeout_ms {
        config.connect_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.daemon.request_timeout_ms {
        config.request_timeout = Duration::from_millis(ms);
    }

    if toml.chat.model.is_some() {
        config.model = toml.chat.model.clone();
    }
    if let Some(turns) = toml.chat.max_context_turns {
        config.max_context_turns = turns;
    }
    if let Some(ms) = toml.chat.poll_interval_ms {
        config.poll_interval = Duration::from_millis(ms);
    }
    if let Some(capacity) = toml.chat.channel_capacity {
        config.channel_capacity = capacity;
    }
}

/// Apply environment overrides through `lookup` (normally `std::env::var`)
fn apply_env_config(config: &mut ClientConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("AGENTDASH_URL") {
        config.base_url = url.trim_end_matches('/').to_string();
        config.source = ConfigSource::Env;
    }
    if let Some(model) = lookup("AGENTDASH_MODEL") {
        if !model.trim().is_empty() {
            config.model = Some(model);
            config.source = ConfigSource::Env;
        }
    }
    if let Some(turns) = lookup("AGENTDASH_MAX_CONTEXT").and_then(|v| v.parse().ok()) {
        config.max_context_turns = turns;
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = lookup("AGENTDASH_POLL_MS").and_then(|v| v.parse::<u64>().ok()) {
        config.poll_interval = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
}

/// CLI overrides applied on top of file and environment
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Daemon URL override
    pub base_url: Option<String>,
    /// Model override
    pub model: Option<String>,
    /// Poll interval override in milliseconds
    pub poll_interval_ms: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set daemon URL override
    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Set model override
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    /// Set poll interval override
    #[must_use]
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = Some(ms);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ClientConfig) {
        if self.base_url.is_some() || self.model.is_some() || self.poll_interval_ms.is_some() {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.base_url {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(ref model) = self.model {
            config.model = Some(model.clone());
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval = Duration::from_millis(ms);
        }
    }
}
