//! Configuration for the notes store

use std::path::{Path, PathBuf};
use std::time::Duration;

use libcostate::logging::{LogFormat, LoggingConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

pub const CONFIG_ENV: &str = "COSTATE_CONFIG";

/// Notes older than this are reloaded
pub const DEFAULT_TTL_SECS: u64 = 180;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub notes: NotesConfig,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotesConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_ttl_secs() -> u64 {
    DEFAULT_TTL_SECS
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_level(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing file yields the default configuration.
    pub fn load() -> Result<Self> {
        let path = resolve_config_path()?;
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// How long loaded notes stay fresh
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.notes.ttl_secs)
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::new(self.logging.format, self.logging.level.clone(), false)
    }
}

/// Resolve the configuration file path
///
/// `COSTATE_CONFIG` wins (with `~` expanded); otherwise
/// `<config dir>/costate/config.toml`.
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir =
        dirs::config_dir().ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("costate").join("config.toml"))
}
