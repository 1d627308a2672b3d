//! Host configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Host settings, usually loaded from a JSON file.
///
/// Every field has a default, so `{}` is a valid configuration.
///
/// # Example
///
/// ```
/// use sparkline_core::HostConfig;
///
/// let config = HostConfig::from_json_str(r#"{"plugin_dir": "bots/plugins", "player_name": "Nexto"}"#).unwrap();
/// assert_eq!(config.player_name, "Nexto");
/// assert_eq!(config.local_player_index, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Directory scanned for plugin manifests
    pub plugin_dir: PathBuf,
    /// How long shutdown waits for background tasks, in milliseconds
    pub shutdown_grace_ms: u64,
    /// Default `tracing` filter when `RUST_LOG` is unset
    pub log_filter: String,
    /// Index of the local player's car
    pub local_player_index: usize,
    /// Name of the local player
    pub player_name: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            plugin_dir: PathBuf::from("plugins"),
            shutdown_grace_ms: 2000,
            log_filter: "info".to_string(),
            local_player_index: 0,
            player_name: "Sparkline".to_string(),
        }
    }
}

impl HostConfig {
    /// Defaults with `plugin_dir` replaced.
    #[must_use]
    pub fn with_plugin_dir(plugin_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
            ..Self::default()
        }
    }

    /// Parses a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or unknown fields and
    /// [`ConfigError::Invalid`] for values that fail validation.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file.
    ///
    /// A relative `plugin_dir` is resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_json_str`](Self::from_json_str).
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json_str(&text)?;
        if config.plugin_dir.is_relative() {
            if let Some(base) = path.parent() {
                config.plugin_dir = base.join(&config.plugin_dir);
            }
        }
        Ok(config)
    }

    /// Checks value constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.plugin_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "plugin_dir",
                reason: "must not be empty",
            });
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "log_filter",
                reason: "must not be empty",
            });
        }
        Ok(())
    }

    /// Grace period for background tasks on shutdown.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// The file is not a valid configuration.
    #[error("invalid config: {0}")]
    Parse(#[source] serde_json::Error),
    /// A field has an unusable value.
    #[error("invalid config field {field}: {reason}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// Constraint that failed
        reason: &'static str,
    },
}
