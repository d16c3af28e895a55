//! Outbound collaborators: the remote workflow engine and the notification queue.

use crate::domain::identifier::WorkflowExecutionId;
use crate::domain::launch_plan::LaunchPlan;
use crate::domain::literal::LiteralMap;
use crate::domain::notification::EmailMessage;
use crate::domain::workflow::CompiledWorkflowClosure;
use crate::error::CoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Everything the engine needs to start an execution
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteWorkflowInput {
    /// Identity of the new execution
    pub execution_id: WorkflowExecutionId,
    /// Compiled workflow with queue assignments and resource defaults applied
    pub workflow: CompiledWorkflowClosure,
    /// Resolved inputs
    pub inputs: LiteralMap,
    /// Launch plan being run
    pub reference: LaunchPlan,
    /// When the control plane accepted the request
    pub accepted_at: DateTime<Utc>,
    /// Effective labels
    pub labels: HashMap<String, String>,
    /// Effective annotations
    pub annotations: HashMap<String, String>,
}

/// Where the engine placed an execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionInfo {
    /// Cluster running the execution
    pub cluster: String,
}

/// Request to abort an execution on its cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminateWorkflowInput {
    /// Execution to abort
    pub execution_id: WorkflowExecutionId,
    /// Cluster recorded at dispatch
    pub cluster: String,
}

/// The remote engine that runs workflows
#[async_trait]
pub trait WorkflowExecutor: Send + Sync {
    /// Hand an execution to the engine
    async fn execute_workflow(&self, input: ExecuteWorkflowInput) -> Result<ExecutionInfo, CoreError>;

    /// Abort a running execution
    async fn terminate_workflow_execution(&self, input: TerminateWorkflowInput) -> Result<(), CoreError>;
}

/// Queue that carries notifications to the delivery processor
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Enqueue one message
    async fn publish(&self, notification_type: &str, message: &EmailMessage) -> Result<(), CoreError>;
}
