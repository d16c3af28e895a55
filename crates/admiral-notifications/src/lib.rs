//! Notification delivery for the Admiral control plane.
//!
//! The execution manager publishes rendered emails through the core
//! `Publisher` port; this crate provides the queue envelope, an in-process
//! topic and the processor that drains a subscription into an [`Emailer`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod emailer;
pub mod envelope;
pub mod error;
pub mod processor;
pub mod pubsub;

pub use emailer::{Emailer, LoggingEmailer};
pub use error::NotificationError;
pub use processor::NotificationProcessor;
pub use pubsub::{topic, ReceivedMessage, Subscriber, TopicPublisher, TopicSubscriber};
