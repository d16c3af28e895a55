//! Workflow executor used when no remote engine is attached.

use admiral_core::domain::ports::{ExecuteWorkflowInput, ExecutionInfo, TerminateWorkflowInput, WorkflowExecutor};
use admiral_core::CoreError;
use async_trait::async_trait;
use tracing::info;

/// Accepts every dispatch and reports it on a fixed cluster
#[derive(Debug, Clone)]
pub struct LocalWorkflowExecutor {
    cluster: String,
}

impl LocalWorkflowExecutor {
    /// Executor reporting `cluster` for every execution
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
        }
    }
}

#[async_trait]
impl WorkflowExecutor for LocalWorkflowExecutor {
    async fn execute_workflow(&self, input: ExecuteWorkflowInput) -> Result<ExecutionInfo, CoreError> {
        info!(
            execution_id = %input.execution_id,
            tasks = input.workflow.tasks.len(),
            cluster = %self.cluster,
            "Accepted execution"
        );
        Ok(ExecutionInfo {
            cluster: self.cluster.clone(),
        })
    }

    async fn terminate_workflow_execution(&self, input: TerminateWorkflowInput) -> Result<(), CoreError> {
        info!(execution_id = %input.execution_id, cluster = %input.cluster, "Terminated execution");
        Ok(())
    }
}
