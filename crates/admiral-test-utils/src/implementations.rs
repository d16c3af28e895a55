//! Recording fakes of the outbound collaborators.
//!
//! Each fake keeps every call for inspection and can be switched into a
//! failing mode.

use admiral_core::domain::notification::EmailMessage;
use admiral_core::domain::ports::{
    ExecuteWorkflowInput, ExecutionInfo, Publisher, TerminateWorkflowInput, WorkflowExecutor,
};
use admiral_core::CoreError;
use admiral_notifications::{Emailer, NotificationError, ReceivedMessage, Subscriber};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Workflow executor that records dispatches and terminations
#[derive(Debug)]
pub struct RecordingWorkflowExecutor {
    cluster: String,
    executed: Mutex<Vec<ExecuteWorkflowInput>>,
    terminated: Mutex<Vec<TerminateWorkflowInput>>,
    fail_execute: Mutex<Option<String>>,
    fail_terminate: Mutex<Option<String>>,
}

impl RecordingWorkflowExecutor {
    /// Executor placing every execution on `cluster`
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            executed: Mutex::new(Vec::new()),
            terminated: Mutex::new(Vec::new()),
            fail_execute: Mutex::new(None),
            fail_terminate: Mutex::new(None),
        }
    }

    /// Reject subsequent dispatches with `reason`
    pub fn fail_execute(&self, reason: impl Into<String>) {
        *self.fail_execute.lock() = Some(reason.into());
    }

    /// Reject subsequent terminations with `reason`
    pub fn fail_terminate(&self, reason: impl Into<String>) {
        *self.fail_terminate.lock() = Some(reason.into());
    }

    /// Every dispatch seen, including rejected ones
    pub fn executed(&self) -> Vec<ExecuteWorkflowInput> {
        self.executed.lock().clone()
    }

    /// Every termination seen, including rejected ones
    pub fn terminated(&self) -> Vec<TerminateWorkflowInput> {
        self.terminated.lock().clone()
    }
}

impl Default for RecordingWorkflowExecutor {
    fn default() -> Self {
        Self::new("cluster-1")
    }
}

#[async_trait]
impl WorkflowExecutor for RecordingWorkflowExecutor {
    async fn execute_workflow(&self, input: ExecuteWorkflowInput) -> Result<ExecutionInfo, CoreError> {
        self.executed.lock().push(input);
        if let Some(reason) = self.fail_execute.lock().clone() {
            return Err(CoreError::WorkflowExecutorError(reason));
        }
        Ok(ExecutionInfo {
            cluster: self.cluster.clone(),
        })
    }

    async fn terminate_workflow_execution(&self, input: TerminateWorkflowInput) -> Result<(), CoreError> {
        self.terminated.lock().push(input);
        if let Some(reason) = self.fail_terminate.lock().clone() {
            return Err(CoreError::WorkflowExecutorError(reason));
        }
        Ok(())
    }
}

/// Publisher that records every message
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, EmailMessage)>>,
    fail: Mutex<Option<String>>,
}

impl RecordingPublisher {
    /// Create an empty publisher
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject subsequent publishes with `reason`
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.fail.lock() = Some(reason.into());
    }

    /// Every accepted message with its notification type
    pub fn published(&self) -> Vec<(String, EmailMessage)> {
        self.published.lock().clone()
    }

    /// Accepted messages only
    pub fn messages(&self) -> Vec<EmailMessage> {
        self.published.lock().iter().map(|(_, message)| message.clone()).collect()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, notification_type: &str, message: &EmailMessage) -> Result<(), CoreError> {
        if let Some(reason) = self.fail.lock().clone() {
            return Err(CoreError::Internal(reason));
        }
        self.published
            .lock()
            .push((notification_type.to_string(), message.clone()));
        Ok(())
    }
}

/// Emailer that records every message it is asked to send
#[derive(Debug, Default)]
pub struct RecordingEmailer {
    sent: Mutex<Vec<EmailMessage>>,
    fail: Mutex<Option<String>>,
}

impl RecordingEmailer {
    /// Create an empty emailer
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject subsequent sends with `reason`
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.fail.lock() = Some(reason.into());
    }

    /// Accepted messages, in send order
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Emailer for RecordingEmailer {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        if let Some(reason) = self.fail.lock().clone() {
            return Err(NotificationError::Emailer(reason));
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

/// Subscriber that records acks and can reject them, delivering from `inner`
#[derive(Debug)]
pub struct RecordingSubscriber<S> {
    inner: S,
    acked: Mutex<Vec<u64>>,
    fail_acks: Mutex<Option<String>>,
}

impl<S: Subscriber> RecordingSubscriber<S> {
    /// Wrap a subscription
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            acked: Mutex::new(Vec::new()),
            fail_acks: Mutex::new(None),
        }
    }

    /// Wrapped subscription
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Reject subsequent acks with `reason`
    pub fn fail_acks(&self, reason: impl Into<String>) {
        *self.fail_acks.lock() = Some(reason.into());
    }

    /// Ids of the acknowledged messages, in ack order
    pub fn acked(&self) -> Vec<u64> {
        self.acked.lock().clone()
    }
}

#[async_trait]
impl<S: Subscriber> Subscriber for RecordingSubscriber<S> {
    async fn receive(&self) -> Option<ReceivedMessage> {
        self.inner.receive().await
    }

    async fn ack(&self, message: &ReceivedMessage) -> Result<(), NotificationError> {
        if let Some(reason) = self.fail_acks.lock().clone() {
            return Err(NotificationError::Ack(reason));
        }
        self.inner.ack(message).await?;
        self.acked.lock().push(message.id);
        Ok(())
    }

    fn terminal_error(&self) -> Option<NotificationError> {
        self.inner.terminal_error()
    }

    async fn stop(&self) -> Result<(), NotificationError> {
        self.inner.stop().await
    }
}
