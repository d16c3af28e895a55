use crate::domain::execution::{ExecutionEventRecord, WorkflowExecution};
use crate::domain::identifier::{Identifier, NodeExecutionId, TaskExecutionId, WorkflowExecutionId};
use crate::domain::launch_plan::LaunchPlan;
use crate::domain::list::ListResourceInput;
use crate::domain::node_execution::{NodeExecution, NodeExecutionEventRecord, TaskExecution};
use crate::domain::phase::{NodeExecutionPhase, WorkflowExecutionPhase};
use crate::domain::workflow::Workflow;
use crate::error::CoreError;
use async_trait::async_trait;
use std::sync::Arc;

/// Repository for workflow execution records and their events
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    /// Insert a new execution and assign its internal id.
    ///
    /// Fails with `AlreadyExists` when the identity is taken.
    async fn create(&self, execution: WorkflowExecution) -> Result<WorkflowExecution, CoreError>;

    /// Find an execution by identity
    async fn get(&self, id: &WorkflowExecutionId) -> Result<WorkflowExecution, CoreError>;

    /// Find an execution by internal id
    async fn get_by_id(&self, internal_id: u64) -> Result<WorkflowExecution, CoreError>;

    /// Replace the record and append the event as one atomic step.
    ///
    /// Fails with `ConcurrentModification` when the stored phase is no longer
    /// `expected_phase`, and with `AlreadyExists` when the request id already
    /// recorded this phase.
    async fn update_with_event(
        &self,
        event: ExecutionEventRecord,
        execution: &WorkflowExecution,
        expected_phase: WorkflowExecutionPhase,
    ) -> Result<(), CoreError>;

    /// Replace the record without an event.
    ///
    /// The stored phase must equal the record's phase, otherwise the write
    /// fails with `ConcurrentModification`.
    async fn update_execution(&self, execution: &WorkflowExecution) -> Result<(), CoreError>;

    /// One page of executions
    async fn list(&self, input: &ListResourceInput) -> Result<Vec<WorkflowExecution>, CoreError>;

    /// Events recorded for an execution, oldest first
    async fn list_events(&self, id: &WorkflowExecutionId) -> Result<Vec<ExecutionEventRecord>, CoreError>;
}

/// Repository for node execution records and their events
#[async_trait]
pub trait NodeExecutionRepository: Send + Sync {
    /// Insert a node with its first event and assign its internal id.
    ///
    /// Fails with `AlreadyExists` when the identity is taken.
    async fn create(&self, event: NodeExecutionEventRecord, node: NodeExecution) -> Result<NodeExecution, CoreError>;

    /// Find a node by identity
    async fn get(&self, id: &NodeExecutionId) -> Result<NodeExecution, CoreError>;

    /// Replace the record and append the event as one atomic step
    async fn update_with_event(
        &self,
        event: NodeExecutionEventRecord,
        node: &NodeExecution,
        expected_phase: NodeExecutionPhase,
    ) -> Result<(), CoreError>;

    /// One page of nodes
    async fn list(&self, input: &ListResourceInput) -> Result<Vec<NodeExecution>, CoreError>;

    /// Events recorded for a node, oldest first
    async fn list_events(&self, id: &NodeExecutionId) -> Result<Vec<NodeExecutionEventRecord>, CoreError>;
}

/// Lookup of task attempts recorded by the engine
#[async_trait]
pub trait TaskExecutionRepository: Send + Sync {
    /// Find a task attempt by identity
    async fn get(&self, id: &TaskExecutionId) -> Result<TaskExecution, CoreError>;
}

/// Lookup of registered launch plans
#[async_trait]
pub trait LaunchPlanRepository: Send + Sync {
    /// Find a launch plan by identity
    async fn get(&self, id: &Identifier) -> Result<LaunchPlan, CoreError>;
}

/// Lookup of registered workflows
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Find a workflow by identity
    async fn get(&self, id: &Identifier) -> Result<Workflow, CoreError>;
}

/// Every repository the managers need
#[derive(Clone)]
pub struct Repositories {
    /// Workflow executions
    pub executions: Arc<dyn ExecutionRepository>,
    /// Node executions
    pub node_executions: Arc<dyn NodeExecutionRepository>,
    /// Task executions
    pub task_executions: Arc<dyn TaskExecutionRepository>,
    /// Launch plans
    pub launch_plans: Arc<dyn LaunchPlanRepository>,
    /// Workflows
    pub workflows: Arc<dyn WorkflowRepository>,
}
