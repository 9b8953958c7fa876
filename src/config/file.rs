use crate::backend::BackendSpec;
use crate::error::{WardenError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Optional on-disk settings, every field may be omitted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Directory to serve, relative paths resolve against the binary's directory
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Listen port used when no environment override is set
    #[serde(default)]
    pub port: Option<u16>,

    /// Log file, relative paths resolve against the served directory
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Seconds between liveness checks
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,

    /// Seconds to wait after SIGTERM before sending SIGKILL
    #[serde(default)]
    pub stop_timeout_secs: Option<u64>,

    /// Set to false to never take the wake-lock, even where supported
    #[serde(default)]
    pub wake_lock: Option<bool>,

    /// Application entry point for application-server backends
    #[serde(default)]
    pub app: Option<String>,

    /// Explicit candidate list, replaces the built-in defaults
    #[serde(default)]
    pub backends: Option<Vec<BackendSpec>>,
}

impl ConfigFile {
    /// Load settings from a file (supports TOML and JSON)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            WardenError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let file = match extension {
            "toml" => Self::parse_toml(&contents)?,
            "json" => Self::parse_json(&contents)?,
            _ => {
                return Err(WardenError::InvalidConfig(format!(
                    "Unsupported file format: {}. Use .toml or .json",
                    extension
                )))
            }
        };

        file.validate()?;
        Ok(file)
    }

    fn parse_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| WardenError::InvalidConfig(format!("Failed to parse TOML: {}", e)))
    }

    fn parse_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents)
            .map_err(|e| WardenError::InvalidConfig(format!("Failed to parse JSON: {}", e)))
    }

    /// Validate the settings that cannot be checked by deserialization alone
    pub fn validate(&self) -> Result<()> {
        if self.port == Some(0) {
            return Err(WardenError::InvalidPort("0".to_string()));
        }

        if self.poll_interval_secs == Some(0) {
            return Err(WardenError::InvalidConfig(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }

        if let Some(ref app) = self.app {
            if app.trim().is_empty() {
                return Err(WardenError::InvalidConfig("app must not be empty".to_string()));
            }
        }

        if let Some(ref backends) = self.backends {
            if backends.is_empty() {
                return Err(WardenError::InvalidConfig(
                    "backends must list at least one candidate".to_string(),
                ));
            }
            for backend in backends {
                if backend.name.is_empty() || backend.command.is_empty() {
                    return Err(WardenError::InvalidConfig(
                        "every backend needs a name and a command".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}
