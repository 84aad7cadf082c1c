//! Configuration management for Viewstate

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Buffer per event-bus subscriber before lagging receivers drop events
    pub event_capacity: usize,
    /// Applied actions kept in the history log; 0 keeps everything
    pub history_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            event_capacity: 100,
            history_limit: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-request timeout in humantime form ("30s", "1m 30s")
    pub request_timeout: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout: "30s".to_string(),
        }
    }
}

impl FetchConfig {
    pub fn request_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.request_timeout).map_err(|e| {
            ConfigError::InvalidDuration {
                field: "fetch.request_timeout".to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing file is not an error: defaults are used instead.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.fetch.request_timeout()?;
        if self.store.event_capacity == 0 {
            return Err(ConfigError::MissingField("store.event_capacity (must be > 0)".to_string()).into());
        }
        Ok(())
    }
}

/// Resolve the configuration file path using the XDG base directory layout
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("VIEWSTATE_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("viewstate").join("config.toml"))
}
