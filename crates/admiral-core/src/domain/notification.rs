use crate::domain::phase::WorkflowExecutionPhase;
use serde::{Deserialize, Serialize};

/// Message type attached to published email notifications
pub const EMAIL_NOTIFICATION_TYPE: &str = "email_notification";

/// Where a notification is delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationChannel {
    /// Plain email
    Email {
        /// Recipient addresses
        recipients_email: Vec<String>,
    },
    /// Chat integration reached through an email gateway
    Chat {
        /// Recipient addresses
        recipients_email: Vec<String>,
    },
    /// Paging integration reached through an email gateway
    Pager {
        /// Recipient addresses
        recipients_email: Vec<String>,
    },
}

impl NotificationChannel {
    /// Recipient addresses of the channel
    pub fn recipients(&self) -> &[String] {
        match self {
            NotificationChannel::Email { recipients_email }
            | NotificationChannel::Chat { recipients_email }
            | NotificationChannel::Pager { recipients_email } => recipients_email,
        }
    }
}

/// A request to be told when an execution reaches certain phases
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSetting {
    /// Phases that trigger the notification
    #[serde(default)]
    pub phases: Vec<WorkflowExecutionPhase>,
    /// Delivery channel; a setting without one cannot be delivered
    #[serde(default)]
    pub channel: Option<NotificationChannel>,
}

impl NotificationSetting {
    /// Email notification for the given phases
    pub fn email(phases: Vec<WorkflowExecutionPhase>, recipients: Vec<String>) -> Self {
        Self {
            phases,
            channel: Some(NotificationChannel::Email {
                recipients_email: recipients,
            }),
        }
    }

    /// Chat notification for the given phases
    pub fn chat(phases: Vec<WorkflowExecutionPhase>, recipients: Vec<String>) -> Self {
        Self {
            phases,
            channel: Some(NotificationChannel::Chat {
                recipients_email: recipients,
            }),
        }
    }

    /// Pager notification for the given phases
    pub fn pager(phases: Vec<WorkflowExecutionPhase>, recipients: Vec<String>) -> Self {
        Self {
            phases,
            channel: Some(NotificationChannel::Pager {
                recipients_email: recipients,
            }),
        }
    }
}

/// Recipients of one email, whatever channel they came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailNotification {
    /// Recipient addresses
    pub recipients_email: Vec<String>,
}

/// Rendered email handed to the delivery pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Recipient addresses
    pub recipients_email: Vec<String>,
    /// Sender address
    pub sender_email: String,
    /// Subject line
    pub subject_line: String,
    /// Message body
    pub body: String,
}

/// Notification choice made by the caller of CreateExecution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationOverrides {
    /// Use the launch plan's notifications
    #[default]
    Inherit,
    /// Use these notifications instead; an empty list means inherit
    Notifications(Vec<NotificationSetting>),
    /// Send no notifications at all
    DisableAll,
}
