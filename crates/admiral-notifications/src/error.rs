//! Error types for notification delivery

use thiserror::Error;

/// Notification delivery errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// Envelope or payload could not be decoded
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Envelope decoded but its data field is missing or mistyped
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// The subscription failed
    #[error("Subscriber error: {0}")]
    Subscriber(String),

    /// The message could not be acknowledged
    #[error("Ack error: {0}")]
    Ack(String),

    /// The email provider rejected the message
    #[error("Emailer error: {0}")]
    Emailer(String),

    /// Publishing to the topic failed
    #[error("Publish error: {0}")]
    Publish(String),
}

impl From<base64::DecodeError> for NotificationError {
    fn from(err: base64::DecodeError) -> Self {
        NotificationError::Decoding(err.to_string())
    }
}

impl From<serde_json::Error> for NotificationError {
    fn from(err: serde_json::Error) -> Self {
        NotificationError::Decoding(err.to_string())
    }
}

impl From<NotificationError> for admiral_core::CoreError {
    fn from(err: NotificationError) -> Self {
        admiral_core::CoreError::Internal(err.to_string())
    }
}
