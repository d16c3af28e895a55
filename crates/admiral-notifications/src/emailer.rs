//! Email sending abstraction.

use crate::error::NotificationError;
use admiral_core::domain::notification::EmailMessage;
use async_trait::async_trait;
use tracing::info;

/// Sends rendered emails to their recipients
#[async_trait]
pub trait Emailer: Send + Sync {
    /// Send one message
    async fn send_email(&self, message: &EmailMessage) -> Result<(), NotificationError>;
}

/// Emailer that only logs what it would send
#[derive(Debug, Clone, Default)]
pub struct LoggingEmailer;

#[async_trait]
impl Emailer for LoggingEmailer {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        info!(
            sender = %message.sender_email,
            recipients = ?message.recipients_email,
            subject = %message.subject_line,
            "sending email"
        );
        Ok(())
    }
}
