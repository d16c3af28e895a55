//! Turns notification settings into rendered email messages.
//!
//! Both steps are pure; publishing happens in the execution manager.

use crate::config::NotificationsConfig;
use crate::domain::execution::ExecutionError;
use crate::domain::identifier::WorkflowExecutionId;
use crate::domain::notification::{EmailMessage, EmailNotification, NotificationChannel, NotificationSetting};
use crate::domain::phase::WorkflowExecutionPhase;
use crate::error::CoreError;

const PROJECT: &str = "{{ project }}";
const DOMAIN: &str = "{{ domain }}";
const NAME: &str = "{{ name }}";
const PHASE: &str = "{{ phase }}";
const ERROR: &str = "{{ error }}";

/// Settings triggered by `phase`, as email notifications.
///
/// A setting without a channel fails the whole call.
pub fn normalize(
    settings: &[NotificationSetting],
    phase: WorkflowExecutionPhase,
) -> Result<Vec<EmailNotification>, CoreError> {
    settings
        .iter()
        .filter(|setting| setting.phases.contains(&phase))
        .map(|setting| match &setting.channel {
            Some(
                NotificationChannel::Email { recipients_email }
                | NotificationChannel::Chat { recipients_email }
                | NotificationChannel::Pager { recipients_email },
            ) => Ok(EmailNotification {
                recipients_email: recipients_email.clone(),
            }),
            None => Err(CoreError::UnrecognizedNotificationType(format!(
                "notification for phases {:?} has no channel",
                setting.phases
            ))),
        })
        .collect()
}

fn render(template: &str, execution_id: &WorkflowExecutionId, phase: WorkflowExecutionPhase, error: &str) -> String {
    template
        .replace(PROJECT, &execution_id.project)
        .replace(DOMAIN, &execution_id.domain)
        .replace(NAME, &execution_id.name)
        .replace(PHASE, &phase.as_str().to_lowercase())
        .replace(ERROR, error)
}

/// Render one notification with the configured sender and templates
pub fn to_email_message(
    config: &NotificationsConfig,
    notification: &EmailNotification,
    execution_id: &WorkflowExecutionId,
    phase: WorkflowExecutionPhase,
    error: Option<&ExecutionError>,
) -> EmailMessage {
    let error = error
        .map(|e| format!(" The execution failed with error: [{}].", e.message))
        .unwrap_or_default();
    EmailMessage {
        recipients_email: notification.recipients_email.clone(),
        sender_email: config.sender.clone(),
        subject_line: render(&config.subject_template, execution_id, phase, &error),
        body: render(&config.body_template, execution_id, phase, &error),
    }
}
