//! Error types for the Admiral server

use admiral_core::CoreError;
use admiral_notifications::NotificationError;
use thiserror::Error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Queue routing rules could not be read or parsed
    #[error("Queue configuration error: {0}")]
    QueueConfigError(String),

    /// A lifecycle operation failed
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Notification delivery failed
    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    /// Internal server error
    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl From<config::ConfigError> for ServerError {
    fn from(err: config::ConfigError) -> Self {
        ServerError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::InternalError(err.to_string())
    }
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;
