//! The delivery loop: decode queued envelopes and hand them to the emailer.
//!
//! Every received message is acknowledged, whether or not it could be
//! decoded or sent, so a poison message is never redelivered.

use crate::emailer::Emailer;
use crate::envelope;
use crate::error::NotificationError;
use crate::pubsub::{ReceivedMessage, Subscriber};
use admiral_monitoring::{MetricType, MetricsCollector};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Messages received
pub const MESSAGE_TOTAL: &str = "message_total";
/// Envelopes or payloads that failed to decode
pub const MESSAGE_DECODING_ERROR: &str = "message_decoding_error";
/// Envelopes without a usable data field
pub const MESSAGE_DATA_ERROR: &str = "message_data_error";
/// Failed acknowledgements
pub const MESSAGE_DONE_ERROR: &str = "message_done_error";
/// Emails the emailer rejected
pub const MESSAGE_PROCESSING_ERROR: &str = "message_processing_error";
/// Emails sent
pub const MESSAGE_OK: &str = "message_ok";
/// Subscriptions that closed with an error
pub const CHANNEL_CLOSED_ERROR: &str = "channel_closed_error";
/// Failed stops
pub const STOP_ERROR: &str = "stop_error";

/// Consumes one subscription until it closes
pub struct NotificationProcessor {
    subscriber: Arc<dyn Subscriber>,
    emailer: Arc<dyn Emailer>,
    collector: Arc<dyn MetricsCollector>,
}

impl NotificationProcessor {
    /// Create a processor over a subscription
    pub fn new(
        subscriber: Arc<dyn Subscriber>,
        emailer: Arc<dyn Emailer>,
        collector: Arc<dyn MetricsCollector>,
    ) -> Self {
        Self {
            subscriber,
            emailer,
            collector,
        }
    }

    fn inc(&self, name: &str) {
        self.collector
            .record_metric(name, 1.0, MetricType::Counter, HashMap::new());
    }

    /// Run until the subscription's channel closes.
    ///
    /// Returns the subscription's terminal error, if it had one.
    pub async fn run(&self) -> Result<(), NotificationError> {
        info!("notification processor started");
        while let Some(message) = self.subscriber.receive().await {
            self.inc(MESSAGE_TOTAL);
            self.process(&message).await;
            if let Err(err) = self.subscriber.ack(&message).await {
                self.inc(MESSAGE_DONE_ERROR);
                error!(message_id = message.id, error = %err, "failed to ack message");
            }
        }

        match self.subscriber.terminal_error() {
            Some(err) => {
                self.inc(CHANNEL_CLOSED_ERROR);
                error!(error = %err, "subscription closed with error");
                Err(err)
            }
            None => {
                info!("notification processor stopped");
                Ok(())
            }
        }
    }

    async fn process(&self, message: &ReceivedMessage) {
        let email = match envelope::decode(&message.body) {
            Ok(email) => email,
            Err(failure) => {
                let metric = if failure.is_data_error() {
                    MESSAGE_DATA_ERROR
                } else {
                    MESSAGE_DECODING_ERROR
                };
                self.inc(metric);
                error!(message_id = message.id, error = %failure, "dropping undecodable message");
                return;
            }
        };

        match self.emailer.send_email(&email).await {
            Ok(()) => {
                self.inc(MESSAGE_OK);
                debug!(message_id = message.id, recipients = ?email.recipients_email, "delivered notification");
            }
            Err(err) => {
                self.inc(MESSAGE_PROCESSING_ERROR);
                error!(message_id = message.id, error = %err, "failed to send email");
            }
        }
    }

    /// Stop the subscription; `run` returns once it notices
    pub async fn stop(&self) -> Result<(), NotificationError> {
        self.subscriber.stop().await.map_err(|err| {
            self.inc(STOP_ERROR);
            error!(error = %err, "failed to stop subscription");
            err
        })
    }
}
