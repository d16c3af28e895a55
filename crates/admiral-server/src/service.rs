//! The admin service: the control plane's public operations.
//!
//! Request timestamps are taken here; the managers never read the clock for
//! submission times.

use admiral_core::domain::execution::{
    ExecutionCreateRequest, ExecutionData, ExecutionList, ExecutionRelaunchRequest, ExecutionTerminateRequest,
    ResourceListRequest, WorkflowExecution, WorkflowExecutionEventRequest,
};
use admiral_core::domain::node_execution::{
    NodeExecution, NodeExecutionEventRequest, NodeExecutionForTaskListRequest, NodeExecutionList,
    NodeExecutionListRequest,
};
use admiral_core::{CoreError, ExecutionManager, NodeExecutionId, NodeExecutionManager, WorkflowExecutionId};
use chrono::Utc;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Entry point for clients and the engine's event reporters
#[derive(Clone)]
pub struct AdminService {
    executions: Arc<ExecutionManager>,
    nodes: Arc<NodeExecutionManager>,
}

impl AdminService {
    /// Serve over the given managers
    pub fn new(executions: Arc<ExecutionManager>, nodes: Arc<NodeExecutionManager>) -> Self {
        Self { executions, nodes }
    }

    /// Workflow execution manager
    pub fn executions(&self) -> &Arc<ExecutionManager> {
        &self.executions
    }

    /// Launch a new execution
    #[instrument(skip(self, request), fields(project = %request.project, domain = %request.domain))]
    pub async fn create_execution(&self, request: ExecutionCreateRequest) -> Result<WorkflowExecutionId, CoreError> {
        self.executions
            .create_execution(request, Utc::now())
            .await
            .map_err(log_failure)
    }

    /// Launch a copy of an existing execution
    #[instrument(skip(self, request), fields(execution_id = %request.id))]
    pub async fn relaunch_execution(
        &self,
        request: ExecutionRelaunchRequest,
    ) -> Result<WorkflowExecutionId, CoreError> {
        self.executions
            .relaunch_execution(request, Utc::now())
            .await
            .map_err(log_failure)
    }

    /// Record a workflow phase change
    #[instrument(skip(self, request), fields(execution_id = %request.event.execution_id, phase = ?request.event.phase))]
    pub async fn record_execution_event(&self, request: WorkflowExecutionEventRequest) -> Result<(), CoreError> {
        self.executions.record_execution_event(request).await.map_err(log_failure)
    }

    /// Read one execution
    pub async fn get_execution(&self, id: &WorkflowExecutionId) -> Result<WorkflowExecution, CoreError> {
        self.executions.get_execution(id).await
    }

    /// Data-access locations of an execution
    pub async fn get_execution_data(&self, id: &WorkflowExecutionId) -> Result<ExecutionData, CoreError> {
        self.executions.get_execution_data(id).await
    }

    /// A page of executions
    pub async fn list_executions(&self, request: ResourceListRequest) -> Result<ExecutionList, CoreError> {
        self.executions.list_executions(request).await
    }

    /// Abort an execution
    #[instrument(skip(self, request), fields(execution_id = %request.id))]
    pub async fn terminate_execution(&self, request: ExecutionTerminateRequest) -> Result<(), CoreError> {
        self.executions.terminate_execution(request).await.map_err(log_failure)
    }

    /// Record a node phase change
    #[instrument(skip(self, request), fields(node_execution_id = %request.event.id, phase = ?request.event.phase))]
    pub async fn record_node_event(&self, request: NodeExecutionEventRequest) -> Result<(), CoreError> {
        self.nodes.record_node_event(request).await.map_err(log_failure)
    }

    /// Read one node execution
    pub async fn get_node_execution(&self, id: &NodeExecutionId) -> Result<NodeExecution, CoreError> {
        self.nodes.get_node_execution(id).await
    }

    /// A page of the nodes of one execution
    pub async fn list_node_executions(&self, request: NodeExecutionListRequest) -> Result<NodeExecutionList, CoreError> {
        self.nodes.list_node_executions(request).await
    }

    /// A page of the nodes produced by one task attempt
    pub async fn list_node_executions_for_task(
        &self,
        request: NodeExecutionForTaskListRequest,
    ) -> Result<NodeExecutionList, CoreError> {
        self.nodes.list_node_executions_for_task(request).await
    }

    /// Data-access locations of a node
    pub async fn get_node_execution_data(&self, id: &NodeExecutionId) -> Result<ExecutionData, CoreError> {
        self.nodes.get_node_execution_data(id).await
    }
}

fn log_failure(err: CoreError) -> CoreError {
    if err.kind().is_retryable() {
        warn!(error = %err, kind = %err.kind(), "request failed");
    }
    err
}
