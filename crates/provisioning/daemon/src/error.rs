//! Error types for provisiond

use provisioning_engine::{ProvisioningError, StorageError};
use thiserror::Error;

/// Daemon error type
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Engine error: {0}")]
    Engine(#[from] ProvisioningError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Task failed: {0}")]
    Task(String),
}

impl From<config::ConfigError> for DaemonError {
    fn from(err: config::ConfigError) -> Self {
        DaemonError::Config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for DaemonError {
    fn from(err: tokio::task::JoinError) -> Self {
        DaemonError::Task(err.to_string())
    }
}

/// Result type for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;
