use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use async_trait::async_trait;

use admiral_core::{
    domain::execution::{ExecutionEventRecord, WorkflowExecution},
    domain::identifier::{Identifier, NodeExecutionId, TaskExecutionId, WorkflowExecutionId},
    domain::launch_plan::LaunchPlan,
    domain::list::{apply_list_input, ListResourceInput},
    domain::node_execution::{NodeExecution, NodeExecutionEventRecord, TaskExecution},
    domain::phase::{NodeExecutionPhase, WorkflowExecutionPhase},
    domain::repository::{
        ExecutionRepository, LaunchPlanRepository, NodeExecutionRepository, TaskExecutionRepository,
        WorkflowRepository,
    },
    domain::workflow::Workflow,
    CoreError,
};

/// Records keyed by internal id, so iteration follows insertion order, plus
/// the identity index and the event log.
#[derive(Debug)]
pub struct Table<K, R, E> {
    records: BTreeMap<u64, R>,
    index: HashMap<K, u64>,
    events: Vec<E>,
    next_id: u64,
}

impl<K, R, E> Default for Table<K, R, E> {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            index: HashMap::new(),
            events: Vec::new(),
            next_id: 1,
        }
    }
}

impl<K, R, E> Table<K, R, E> {
    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<K: Eq + Hash, R, E> Table<K, R, E> {
    fn get(&self, key: &K) -> Option<&R> {
        self.index.get(key).and_then(|id| self.records.get(id))
    }

    fn get_mut(&mut self, key: &K) -> Option<&mut R> {
        match self.index.get(key) {
            Some(id) => self.records.get_mut(id),
            None => None,
        }
    }

    fn insert(&mut self, key: K, record: R) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.index.insert(key, id);
        self.records.insert(id, record);
        id
    }
}

/// Workflow execution storage shared by the provider and its repositories
pub type ExecutionTable = Table<WorkflowExecutionId, WorkflowExecution, ExecutionEventRecord>;

/// Node execution storage shared by the provider and its repositories
pub type NodeExecutionTable = Table<NodeExecutionId, NodeExecution, NodeExecutionEventRecord>;

fn not_found(what: &str, id: &dyn std::fmt::Display) -> CoreError {
    CoreError::NotFound(format!("{} [{}] not found", what, id))
}

/// In-memory implementation of the ExecutionRepository
pub struct InMemoryExecutionRepository {
    table: Arc<RwLock<ExecutionTable>>,
}

impl InMemoryExecutionRepository {
    /// Create a new in-memory execution repository
    pub fn new(table: Arc<RwLock<ExecutionTable>>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl ExecutionRepository for InMemoryExecutionRepository {
    async fn create(&self, mut execution: WorkflowExecution) -> Result<WorkflowExecution, CoreError> {
        let mut table = self.table.write().await;
        if table.index.contains_key(&execution.id) {
            return Err(CoreError::AlreadyExists(format!(
                "execution [{}] already exists",
                execution.id
            )));
        }
        execution.internal_id = table.next_id;
        table.insert(execution.id.clone(), execution.clone());
        debug!(execution_id = %execution.id, internal_id = execution.internal_id, "stored execution");
        Ok(execution)
    }

    async fn get(&self, id: &WorkflowExecutionId) -> Result<WorkflowExecution, CoreError> {
        let table = self.table.read().await;
        table.get(id).cloned().ok_or_else(|| not_found("execution", id))
    }

    async fn get_by_id(&self, internal_id: u64) -> Result<WorkflowExecution, CoreError> {
        let table = self.table.read().await;
        table
            .records
            .get(&internal_id)
            .cloned()
            .ok_or_else(|| not_found("execution", &internal_id))
    }

    async fn update_with_event(
        &self,
        event: ExecutionEventRecord,
        execution: &WorkflowExecution,
        expected_phase: WorkflowExecutionPhase,
    ) -> Result<(), CoreError> {
        let mut table = self.table.write().await;
        let duplicate = table.events.iter().any(|recorded| {
            recorded.execution_id == event.execution_id
                && recorded.request_id == event.request_id
                && recorded.phase == event.phase
        });
        if duplicate {
            return Err(CoreError::AlreadyExists(format!(
                "event [{}] already recorded for execution [{}]",
                event.request_id, event.execution_id
            )));
        }
        let stored = table
            .get_mut(&execution.id)
            .ok_or_else(|| not_found("execution", &execution.id))?;
        if stored.closure.phase != expected_phase {
            return Err(CoreError::ConcurrentModification(format!(
                "execution [{}] moved to {} while recording {}",
                execution.id, stored.closure.phase, event.phase
            )));
        }
        *stored = execution.clone();
        table.events.push(event);
        Ok(())
    }

    async fn update_execution(&self, execution: &WorkflowExecution) -> Result<(), CoreError> {
        let mut table = self.table.write().await;
        let stored = table
            .get_mut(&execution.id)
            .ok_or_else(|| not_found("execution", &execution.id))?;
        if stored.closure.phase != execution.closure.phase {
            return Err(CoreError::ConcurrentModification(format!(
                "execution [{}] moved to {}",
                execution.id, stored.closure.phase
            )));
        }
        *stored = execution.clone();
        Ok(())
    }

    async fn list(&self, input: &ListResourceInput) -> Result<Vec<WorkflowExecution>, CoreError> {
        let table = self.table.read().await;
        Ok(apply_list_input(table.records.values().cloned(), input))
    }

    async fn list_events(&self, id: &WorkflowExecutionId) -> Result<Vec<ExecutionEventRecord>, CoreError> {
        let table = self.table.read().await;
        Ok(table
            .events
            .iter()
            .filter(|event| &event.execution_id == id)
            .cloned()
            .collect())
    }
}

/// In-memory implementation of the NodeExecutionRepository
pub struct InMemoryNodeExecutionRepository {
    table: Arc<RwLock<NodeExecutionTable>>,
}

impl InMemoryNodeExecutionRepository {
    /// Create a new in-memory node execution repository
    pub fn new(table: Arc<RwLock<NodeExecutionTable>>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl NodeExecutionRepository for InMemoryNodeExecutionRepository {
    async fn create(&self, event: NodeExecutionEventRecord, mut node: NodeExecution) -> Result<NodeExecution, CoreError> {
        let mut table = self.table.write().await;
        if table.index.contains_key(&node.id) {
            return Err(CoreError::AlreadyExists(format!("node execution [{}] already exists", node.id)));
        }
        node.internal_id = table.next_id;
        table.insert(node.id.clone(), node.clone());
        table.events.push(event);
        Ok(node)
    }

    async fn get(&self, id: &NodeExecutionId) -> Result<NodeExecution, CoreError> {
        let table = self.table.read().await;
        table.get(id).cloned().ok_or_else(|| not_found("node execution", id))
    }

    async fn update_with_event(
        &self,
        event: NodeExecutionEventRecord,
        node: &NodeExecution,
        expected_phase: NodeExecutionPhase,
    ) -> Result<(), CoreError> {
        let mut table = self.table.write().await;
        let duplicate = table.events.iter().any(|recorded| {
            recorded.node_execution_id == event.node_execution_id
                && recorded.request_id == event.request_id
                && recorded.phase == event.phase
        });
        if duplicate {
            return Err(CoreError::AlreadyExists(format!(
                "event [{}] already recorded for node execution [{}]",
                event.request_id, event.node_execution_id
            )));
        }
        let stored = table
            .get_mut(&node.id)
            .ok_or_else(|| not_found("node execution", &node.id))?;
        if stored.closure.phase != expected_phase {
            return Err(CoreError::ConcurrentModification(format!(
                "node execution [{}] moved to {} while recording {}",
                node.id, stored.closure.phase, event.phase
            )));
        }
        *stored = node.clone();
        table.events.push(event);
        Ok(())
    }

    async fn list(&self, input: &ListResourceInput) -> Result<Vec<NodeExecution>, CoreError> {
        let table = self.table.read().await;
        Ok(apply_list_input(table.records.values().cloned(), input))
    }

    async fn list_events(&self, id: &NodeExecutionId) -> Result<Vec<NodeExecutionEventRecord>, CoreError> {
        let table = self.table.read().await;
        Ok(table
            .events
            .iter()
            .filter(|event| &event.node_execution_id == id)
            .cloned()
            .collect())
    }
}

/// In-memory implementation of the TaskExecutionRepository
pub struct InMemoryTaskExecutionRepository {
    tasks: Arc<RwLock<HashMap<TaskExecutionId, TaskExecution>>>,
}

impl InMemoryTaskExecutionRepository {
    /// Create a new in-memory task execution repository
    pub fn new(tasks: Arc<RwLock<HashMap<TaskExecutionId, TaskExecution>>>) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl TaskExecutionRepository for InMemoryTaskExecutionRepository {
    async fn get(&self, id: &TaskExecutionId) -> Result<TaskExecution, CoreError> {
        let tasks = self.tasks.read().await;
        tasks.get(id).cloned().ok_or_else(|| not_found("task execution", id))
    }
}

/// In-memory implementation of the LaunchPlanRepository
pub struct InMemoryLaunchPlanRepository {
    launch_plans: Arc<RwLock<HashMap<Identifier, LaunchPlan>>>,
}

impl InMemoryLaunchPlanRepository {
    /// Create a new in-memory launch plan repository
    pub fn new(launch_plans: Arc<RwLock<HashMap<Identifier, LaunchPlan>>>) -> Self {
        Self { launch_plans }
    }
}

#[async_trait]
impl LaunchPlanRepository for InMemoryLaunchPlanRepository {
    async fn get(&self, id: &Identifier) -> Result<LaunchPlan, CoreError> {
        let launch_plans = self.launch_plans.read().await;
        launch_plans.get(id).cloned().ok_or_else(|| not_found("launch plan", id))
    }
}

/// In-memory implementation of the WorkflowRepository
pub struct InMemoryWorkflowRepository {
    workflows: Arc<RwLock<HashMap<Identifier, Workflow>>>,
}

impl InMemoryWorkflowRepository {
    /// Create a new in-memory workflow repository
    pub fn new(workflows: Arc<RwLock<HashMap<Identifier, Workflow>>>) -> Self {
        Self { workflows }
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn get(&self, id: &Identifier) -> Result<Workflow, CoreError> {
        let workflows = self.workflows.read().await;
        workflows.get(id).cloned().ok_or_else(|| not_found("workflow", id))
    }
}
