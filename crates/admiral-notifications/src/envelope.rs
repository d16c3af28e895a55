//! The pub/sub envelope carrying one email message.
//!
//! The outer body is a JSON object whose `Message` field holds the standard
//! base64 of the JSON-encoded [`EmailMessage`].

use crate::error::NotificationError;
use admiral_core::domain::notification::EmailMessage;
use serde_json::{json, Value};

/// Field of the outer object holding the encoded message
pub const MESSAGE_FIELD: &str = "Message";
/// Field of the outer object holding the notification type tag
pub const TYPE_FIELD: &str = "Type";

/// Where decoding an envelope stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeFailure {
    /// The outer body is not JSON
    Envelope(NotificationError),
    /// The `Message` field is absent
    MissingMessage,
    /// The `Message` field is not a string
    MessageNotString,
    /// The `Message` field is not valid base64
    Base64(NotificationError),
    /// The decoded bytes are not an email message
    Payload(NotificationError),
}

impl DecodeFailure {
    /// True for failures in the data field rather than in an encoding layer
    pub fn is_data_error(&self) -> bool {
        matches!(self, DecodeFailure::MissingMessage | DecodeFailure::MessageNotString)
    }
}

impl std::fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeFailure::Envelope(err) => write!(f, "envelope is not JSON: {}", err),
            DecodeFailure::MissingMessage => write!(f, "envelope has no {} field", MESSAGE_FIELD),
            DecodeFailure::MessageNotString => write!(f, "envelope {} field is not a string", MESSAGE_FIELD),
            DecodeFailure::Base64(err) => write!(f, "message is not base64: {}", err),
            DecodeFailure::Payload(err) => write!(f, "message is not an email: {}", err),
        }
    }
}

/// Wrap a message for the topic
pub fn encode(notification_type: &str, message: &EmailMessage) -> Result<Vec<u8>, NotificationError> {
    let payload = serde_json::to_vec(message)?;
    let envelope = json!({
        TYPE_FIELD: notification_type,
        MESSAGE_FIELD: base64::encode(payload),
    });
    Ok(serde_json::to_vec(&envelope)?)
}

/// Unwrap a message received from the topic
pub fn decode(body: &[u8]) -> Result<EmailMessage, DecodeFailure> {
    let envelope: Value =
        serde_json::from_slice(body).map_err(|err| DecodeFailure::Envelope(err.into()))?;
    let data = match envelope.get(MESSAGE_FIELD) {
        None => return Err(DecodeFailure::MissingMessage),
        Some(Value::String(data)) => data,
        Some(_) => return Err(DecodeFailure::MessageNotString),
    };
    let payload = base64::decode(data).map_err(|err| DecodeFailure::Base64(err.into()))?;
    serde_json::from_slice(&payload).map_err(|err| DecodeFailure::Payload(err.into()))
}
