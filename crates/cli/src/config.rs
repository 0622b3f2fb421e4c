//! Configuration for the `fpipe` binary.
//!
//! A small JSON file supplies defaults for flags the user leaves off. It lives in the
//! standard configuration directory (`~/.config/fpipe/config.json` on most platforms)
//! unless `FPIPE_CONFIG_PATH` points elsewhere.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Environment variable allowing callers to override the config file path.
pub const CONFIG_PATH_ENV: &str = "FPIPE_CONFIG_PATH";

/// Default filename for the JSON payload.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Error surfaced when reading the configuration fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Persisted CLI defaults.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Tracing filter used when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
    /// Pretty-print JSON output.
    pub pretty: bool,
}

impl CliConfig {
    /// Loads the config from [`default_config_path`].
    pub fn load() -> Result<Self, ConfigError> {
        load_from(&default_config_path())
    }
}

pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fpipe")
        .join(CONFIG_FILE_NAME)
}

/// Reads `path`; a missing file or unparsable JSON yields defaults.
pub fn load_from(path: &Path) -> Result<CliConfig, ConfigError> {
    match fs::read_to_string(path) {
        Ok(data) => match serde_json::from_str(&data) {
            Ok(config) => Ok(config),
            Err(error) => {
                warn!(
                    path = %path.display(),
                    error = %error,
                    "Failed to parse config file; using defaults"
                );
                Ok(CliConfig::default())
            }
        },
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(CliConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
