//! `mockall` mocks of the outbound collaborators, for tests where call
//! expectations matter.

use admiral_core::domain::notification::EmailMessage;
use admiral_core::domain::ports::{
    ExecuteWorkflowInput, ExecutionInfo, Publisher, TerminateWorkflowInput, WorkflowExecutor,
};
use admiral_core::CoreError;
use admiral_notifications::{Emailer, NotificationError};
use async_trait::async_trait;
use mockall::mock;

mock! {
    pub WorkflowExecutor {}

    #[async_trait]
    impl WorkflowExecutor for WorkflowExecutor {
        async fn execute_workflow(&self, input: ExecuteWorkflowInput) -> Result<ExecutionInfo, CoreError>;
        async fn terminate_workflow_execution(&self, input: TerminateWorkflowInput) -> Result<(), CoreError>;
    }
}

mock! {
    pub Publisher {}

    #[async_trait]
    impl Publisher for Publisher {
        async fn publish(&self, notification_type: &str, message: &EmailMessage) -> Result<(), CoreError>;
    }
}

mock! {
    pub Emailer {}

    #[async_trait]
    impl Emailer for Emailer {
        async fn send_email(&self, message: &EmailMessage) -> Result<(), NotificationError>;
    }
}

/// Executor mock that accepts every dispatch onto `cluster`
pub fn accepting_executor(cluster: &str) -> MockWorkflowExecutor {
    let cluster = cluster.to_string();
    let mut executor = MockWorkflowExecutor::new();
    executor.expect_execute_workflow().returning(move |_| {
        Ok(ExecutionInfo {
            cluster: cluster.clone(),
        })
    });
    executor.expect_terminate_workflow_execution().returning(|_| Ok(()));
    executor
}
