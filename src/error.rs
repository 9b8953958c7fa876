use std::path::PathBuf;
use thiserror::Error;

/// Exit status for configuration problems (missing directory, bad port, no backend)
pub const EXIT_CONFIG: i32 = 2;

/// Exit status for spawn and other runtime failures
pub const EXIT_FAILURE: i32 = 1;

/// Main error type for the supervisor
#[derive(Debug, Error)]
pub enum WardenError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration file: {0}")]
    InvalidConfig(String),

    #[error("Working directory '{}' does not exist", .0.display())]
    MissingDirectory(PathBuf),

    #[error("Invalid port '{0}': expected an integer between 1 and 65535")]
    InvalidPort(String),

    #[error("No server backend available (tried: {})", .0.join(", "))]
    NoBackendAvailable(Vec<String>),

    // Process errors
    #[error("Failed to spawn backend '{0}': {1}")]
    SpawnError(String, String),

    #[error("Failed to stop backend '{0}': {1}")]
    StopError(String, String),

    #[error("Signal error: {0}")]
    SignalError(String),

    // Resource lock errors
    #[error("Resource lock error: {0}")]
    LockError(String),

    // Log errors
    #[error("Failed to open log file: {0}")]
    LogFileError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WardenError {
    /// Whether this error belongs to the configuration class
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            WardenError::ConfigError(_)
                | WardenError::InvalidConfig(_)
                | WardenError::MissingDirectory(_)
                | WardenError::InvalidPort(_)
                | WardenError::NoBackendAvailable(_)
        )
    }

    /// Process exit status the binary reports for this error
    pub fn exit_code(&self) -> i32 {
        if self.is_config_error() {
            EXIT_CONFIG
        } else {
            EXIT_FAILURE
        }
    }
}

/// Result type alias for supervisor operations
pub type Result<T> = std::result::Result<T, WardenError>;
