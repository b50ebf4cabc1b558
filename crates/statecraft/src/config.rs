//! Host Configuration
//!
//! Loads `statecraft.toml`. A missing file yields the defaults; command line
//! flags override individual values afterwards.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Machine driving options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Ticks to run; 0 runs until interrupted
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// State to start in instead of the graph's initial state
    pub initial_state: Option<String>,
}

fn default_ticks() -> u64 {
    10
}

fn default_interval_ms() -> u64 {
    250
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            ticks: default_ticks(),
            interval_ms: default_interval_ms(),
            initial_state: None,
        }
    }
}

/// Logging options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "statecraft=info,statecraft_runtime=info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when absent
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !fs::try_exists(path).await? {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
