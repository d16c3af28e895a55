//! In-memory state store for the Admiral control plane
//!
//! This crate provides in-memory implementations of the repository
//! interfaces defined in admiral-core. Each table sits behind one write lock,
//! which makes the phase compare-and-set and the event append a single step.
//! It backs the tests and single-instance deployments where persistence is
//! not required.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

pub mod repositories;
pub use repositories::{
    ExecutionTable, InMemoryExecutionRepository, InMemoryLaunchPlanRepository, InMemoryNodeExecutionRepository,
    InMemoryTaskExecutionRepository, InMemoryWorkflowRepository, NodeExecutionTable,
};

use admiral_core::{
    domain::identifier::{Identifier, TaskExecutionId},
    domain::launch_plan::LaunchPlan,
    domain::node_execution::TaskExecution,
    domain::workflow::Workflow,
    Repositories,
};

/// Provider for in-memory state store repositories
pub struct InMemoryStateStoreProvider {
    // Workflow executions and their events
    executions: Arc<RwLock<ExecutionTable>>,

    // Node executions and their events
    node_executions: Arc<RwLock<NodeExecutionTable>>,

    // Task attempts, registered by the engine
    task_executions: Arc<RwLock<HashMap<TaskExecutionId, TaskExecution>>>,

    // Registered launch plans and workflows
    launch_plans: Arc<RwLock<HashMap<Identifier, LaunchPlan>>>,
    workflows: Arc<RwLock<HashMap<Identifier, Workflow>>>,
}

impl InMemoryStateStoreProvider {
    /// Create a new, empty in-memory state store provider
    pub fn new() -> Self {
        Self {
            executions: Arc::new(RwLock::new(ExecutionTable::default())),
            node_executions: Arc::new(RwLock::new(NodeExecutionTable::default())),
            task_executions: Arc::new(RwLock::new(HashMap::new())),
            launch_plans: Arc::new(RwLock::new(HashMap::new())),
            workflows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create repositories sharing this provider's storage
    pub fn create_repositories(&self) -> Repositories {
        Repositories {
            executions: Arc::new(InMemoryExecutionRepository::new(self.executions.clone())),
            node_executions: Arc::new(InMemoryNodeExecutionRepository::new(self.node_executions.clone())),
            task_executions: Arc::new(InMemoryTaskExecutionRepository::new(self.task_executions.clone())),
            launch_plans: Arc::new(InMemoryLaunchPlanRepository::new(self.launch_plans.clone())),
            workflows: Arc::new(InMemoryWorkflowRepository::new(self.workflows.clone())),
        }
    }

    /// Register a launch plan under its identifier
    pub async fn add_launch_plan(&self, launch_plan: LaunchPlan) {
        debug!(launch_plan = %launch_plan.id, "registering launch plan");
        self.launch_plans
            .write()
            .await
            .insert(launch_plan.id.clone(), launch_plan);
    }

    /// Register a workflow under its identifier
    pub async fn add_workflow(&self, workflow: Workflow) {
        debug!(workflow = %workflow.id, "registering workflow");
        self.workflows.write().await.insert(workflow.id.clone(), workflow);
    }

    /// Record a task attempt so nodes can name it as their parent
    pub async fn add_task_execution(&self, task: TaskExecution) {
        debug!(task_execution = %task.id, "registering task execution");
        self.task_executions.write().await.insert(task.id.clone(), task);
    }

    /// Number of stored workflow executions
    pub async fn execution_count(&self) -> usize {
        self.executions.read().await.len()
    }

    /// Number of stored node executions
    pub async fn node_execution_count(&self) -> usize {
        self.node_executions.read().await.len()
    }
}

impl Default for InMemoryStateStoreProvider {
    fn default() -> Self {
        Self::new()
    }
}
