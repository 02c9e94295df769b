//! Daemon error types.

use thiserror::Error;

/// Errors raised while starting or running the daemon.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for DaemonError {
    fn from(err: config::ConfigError) -> Self {
        DaemonError::Config(err.to_string())
    }
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
