//! Subscription interface and an in-process topic.
//!
//! The topic's publisher side implements the core [`Publisher`] port, so the
//! execution manager can enqueue notifications without knowing who consumes
//! them.

use crate::envelope;
use crate::error::NotificationError;
use admiral_core::domain::notification::EmailMessage;
use admiral_core::{CoreError, Publisher};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};
use tracing::debug;

/// A message delivered by a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Delivery id, unique per subscription
    pub id: u64,
    /// Raw envelope
    pub body: Vec<u8>,
}

/// A subscription to a notification queue
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Next message; `None` once the subscription's channel has closed
    async fn receive(&self) -> Option<ReceivedMessage>;

    /// Acknowledge a message so it is not redelivered
    async fn ack(&self, message: &ReceivedMessage) -> Result<(), NotificationError>;

    /// Error that closed the subscription, if any
    fn terminal_error(&self) -> Option<NotificationError>;

    /// Stop receiving
    async fn stop(&self) -> Result<(), NotificationError>;
}

/// Create a bounded in-process topic
pub fn topic(capacity: usize) -> (TopicPublisher, TopicSubscriber) {
    let (sender, receiver) = mpsc::channel(capacity);
    (
        TopicPublisher { sender },
        TopicSubscriber {
            receiver: tokio::sync::Mutex::new(receiver),
            shutdown: Notify::new(),
            stopped: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            terminal_error: Mutex::new(None),
        },
    )
}

/// Sending half of an in-process topic
#[derive(Debug, Clone)]
pub struct TopicPublisher {
    sender: mpsc::Sender<Vec<u8>>,
}

impl TopicPublisher {
    /// Enqueue a raw envelope without waiting for room.
    ///
    /// A full topic is reported as a publish failure, never waited on.
    pub async fn publish_raw(&self, body: Vec<u8>) -> Result<(), NotificationError> {
        self.sender.try_send(body).map_err(|err| match err {
            TrySendError::Full(_) => NotificationError::Publish("topic full".to_string()),
            TrySendError::Closed(_) => NotificationError::Publish("topic closed".to_string()),
        })
    }
}

#[async_trait]
impl Publisher for TopicPublisher {
    async fn publish(&self, notification_type: &str, message: &EmailMessage) -> Result<(), CoreError> {
        let body = envelope::encode(notification_type, message)?;
        self.publish_raw(body).await?;
        debug!(notification_type, recipients = ?message.recipients_email, "published notification");
        Ok(())
    }
}

/// Receiving half of an in-process topic
#[derive(Debug)]
pub struct TopicSubscriber {
    receiver: tokio::sync::Mutex<mpsc::Receiver<Vec<u8>>>,
    shutdown: Notify,
    stopped: AtomicBool,
    next_id: AtomicU64,
    terminal_error: Mutex<Option<NotificationError>>,
}

impl TopicSubscriber {
    /// Close the subscription as failed; `receive` returns `None` from now on
    pub fn close_with_error(&self, error: NotificationError) {
        *self.terminal_error.lock() = Some(error);
        self.stopped.store(true, Ordering::SeqCst);
        self.shutdown.notify_one();
    }
}

#[async_trait]
impl Subscriber for TopicSubscriber {
    async fn receive(&self) -> Option<ReceivedMessage> {
        if self.stopped.load(Ordering::SeqCst) {
            return None;
        }
        let mut receiver = self.receiver.lock().await;
        let body = tokio::select! {
            body = receiver.recv() => body?,
            _ = self.shutdown.notified() => return None,
        };
        Some(ReceivedMessage {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            body,
        })
    }

    async fn ack(&self, message: &ReceivedMessage) -> Result<(), NotificationError> {
        // In-process deliveries are never redelivered.
        debug!(message_id = message.id, "acked message");
        Ok(())
    }

    fn terminal_error(&self) -> Option<NotificationError> {
        self.terminal_error.lock().clone()
    }

    async fn stop(&self) -> Result<(), NotificationError> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Err(NotificationError::Subscriber("subscription already stopped".to_string()));
        }
        self.shutdown.notify_one();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_published_messages_arrive_in_order() {
        let (publisher, subscriber) = topic(8);
        publisher.publish_raw(b"one".to_vec()).await.unwrap();
        publisher.publish_raw(b"two".to_vec()).await.unwrap();

        let first = subscriber.receive().await.unwrap();
        let second = subscriber.receive().await.unwrap();
        assert_eq!((first.id, first.body), (1, b"one".to_vec()));
        assert_eq!((second.id, second.body), (2, b"two".to_vec()));
    }

    #[tokio::test]
    async fn test_dropping_publisher_closes_channel() {
        let (publisher, subscriber) = topic(8);
        drop(publisher);
        assert_eq!(subscriber.receive().await, None);
        assert_eq!(subscriber.terminal_error(), None);
    }

    #[tokio::test]
    async fn test_full_topic_fails_without_waiting() {
        let (publisher, subscriber) = topic(1);
        publisher.publish_raw(b"one".to_vec()).await.unwrap();

        let second = tokio::time::timeout(Duration::from_secs(2), publisher.publish_raw(b"two".to_vec()))
            .await
            .expect("publish waited on a full topic");
        assert_eq!(second, Err(NotificationError::Publish("topic full".to_string())));

        // Room frees up once the buffered message is taken.
        assert_eq!(subscriber.receive().await.unwrap().body, b"one".to_vec());
        publisher.publish_raw(b"three".to_vec()).await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_after_subscriber_dropped_fails() {
        let (publisher, subscriber) = topic(4);
        drop(subscriber);
        assert_eq!(
            publisher.publish_raw(b"one".to_vec()).await,
            Err(NotificationError::Publish("topic closed".to_string()))
        );
    }

    #[tokio::test]
    async fn test_stop_twice_fails() {
        let (_publisher, subscriber) = topic(8);
        subscriber.stop().await.unwrap();
        assert_eq!(subscriber.receive().await, None);
        assert!(matches!(subscriber.stop().await, Err(NotificationError::Subscriber(_))));
    }

    #[tokio::test]
    async fn test_publisher_port_wraps_envelope() {
        let (publisher, subscriber) = topic(8);
        let message = EmailMessage {
            recipients_email: vec!["a@x.com".to_string()],
            ..Default::default()
        };
        Publisher::publish(&publisher, "email_notification", &message).await.unwrap();

        let received = subscriber.receive().await.unwrap();
        assert_eq!(envelope::decode(&received.body).unwrap(), message);
    }
}
