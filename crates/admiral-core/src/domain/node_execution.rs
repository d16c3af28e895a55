use crate::domain::execution::{EventOutput, ExecutionError};
use crate::domain::identifier::{NodeExecutionId, TaskExecutionId, WorkflowExecutionId};
use crate::domain::list::Sort;
use crate::domain::phase::{NodeExecutionPhase, Phase, TaskExecutionPhase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sub-workflow launched by a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowNodeMetadata {
    /// Identity of the launched execution
    pub execution_id: WorkflowExecutionId,
}

/// Task attempt that dynamically produced a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentTaskMetadata {
    /// Identity of the task attempt
    pub id: TaskExecutionId,
}

/// Mutable state of a node execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeExecutionClosure {
    /// Current phase
    pub phase: NodeExecutionPhase,
    /// When the node first entered running
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// When the last event was applied
    pub updated_at: DateTime<Utc>,
    /// Run time in milliseconds, set on terminal phases of started nodes
    #[serde(default)]
    pub duration_ms: Option<i64>,
    /// Location of the outputs
    #[serde(default)]
    pub output_uri: Option<String>,
    /// Error of a failed node
    #[serde(default)]
    pub error: Option<ExecutionError>,
    /// Sub-workflow launched by the node
    #[serde(default)]
    pub workflow_node_metadata: Option<WorkflowNodeMetadata>,
}

/// A node execution record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeExecution {
    /// Storage-assigned id
    pub internal_id: u64,
    /// Identity
    pub id: NodeExecutionId,
    /// Location of the node inputs
    #[serde(default)]
    pub input_uri: String,
    /// Mutable state
    pub closure: NodeExecutionClosure,
    /// Internal id of the task attempt that produced this node
    #[serde(default)]
    pub parent_task_execution_id: Option<u64>,
}

impl NodeExecution {
    /// Build the record for the first event of an unseen node
    pub fn from_event(
        event: &NodeExecutionEvent,
        occurred_at: DateTime<Utc>,
        parent_task_execution_id: Option<u64>,
    ) -> Self {
        let mut node = NodeExecution {
            internal_id: 0,
            id: event.id.clone(),
            input_uri: event.input_uri.clone(),
            closure: NodeExecutionClosure {
                created_at: occurred_at,
                updated_at: occurred_at,
                ..Default::default()
            },
            parent_task_execution_id,
        };
        node.apply_event(event, occurred_at);
        node
    }

    /// Current phase
    pub fn phase(&self) -> NodeExecutionPhase {
        self.closure.phase
    }

    /// Apply an accepted event to the closure
    pub fn apply_event(&mut self, event: &NodeExecutionEvent, occurred_at: DateTime<Utc>) {
        let closure = &mut self.closure;
        closure.phase = event.phase;
        closure.updated_at = occurred_at;
        if !event.input_uri.is_empty() {
            self.input_uri = event.input_uri.clone();
        }
        if event.phase == NodeExecutionPhase::Running && closure.started_at.is_none() {
            closure.started_at = Some(occurred_at);
        }
        if event.phase.is_terminal() {
            if let Some(started_at) = closure.started_at {
                closure.duration_ms = Some((occurred_at - started_at).num_milliseconds());
            }
        }
        match &event.output {
            Some(EventOutput::Uri(uri)) => closure.output_uri = Some(uri.clone()),
            Some(EventOutput::Error(error)) => closure.error = Some(error.clone()),
            None => {}
        }
        if let Some(metadata) = &event.workflow_node_metadata {
            closure.workflow_node_metadata = Some(metadata.clone());
        }
    }
}

/// Phase change reported by the engine for a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeExecutionEvent {
    /// Target node
    pub id: NodeExecutionId,
    /// Cluster that produced the event
    #[serde(default)]
    pub producer_id: String,
    /// Reported phase
    pub phase: NodeExecutionPhase,
    /// When the phase change happened
    pub occurred_at: Option<DateTime<Utc>>,
    /// Location of the node inputs
    #[serde(default)]
    pub input_uri: String,
    /// Outputs or error
    #[serde(default)]
    pub output: Option<EventOutput>,
    /// Set for nodes produced by a dynamic task
    #[serde(default)]
    pub parent_task_metadata: Option<ParentTaskMetadata>,
    /// Set when the node launched a sub-workflow
    #[serde(default)]
    pub workflow_node_metadata: Option<WorkflowNodeMetadata>,
}

/// A node event plus its idempotency key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeExecutionEventRequest {
    /// Idempotency key
    pub request_id: String,
    /// The event
    pub event: NodeExecutionEvent,
}

/// Accepted node event, appended to the audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeExecutionEventRecord {
    /// Idempotency key of the request
    pub request_id: String,
    /// Target node
    pub node_execution_id: NodeExecutionId,
    /// Accepted phase
    pub phase: NodeExecutionPhase,
    /// When the phase change happened
    pub occurred_at: DateTime<Utc>,
    /// Cluster that produced the event
    pub producer_id: String,
    /// When the event was accepted
    pub recorded_at: DateTime<Utc>,
}

impl NodeExecutionEventRecord {
    /// Build the record for an accepted request
    pub fn from_request(request: &NodeExecutionEventRequest, occurred_at: DateTime<Utc>, recorded_at: DateTime<Utc>) -> Self {
        Self {
            request_id: request.request_id.clone(),
            node_execution_id: request.event.id.clone(),
            phase: request.event.phase,
            occurred_at,
            producer_id: request.event.producer_id.clone(),
            recorded_at,
        }
    }
}

/// Task attempt recorded by the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskExecution {
    /// Storage-assigned id
    pub internal_id: u64,
    /// Identity
    pub id: TaskExecutionId,
    /// Current phase
    pub phase: TaskExecutionPhase,
}

/// Request for a page of nodes of one execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeExecutionListRequest {
    /// Owning execution
    pub workflow_execution_id: WorkflowExecutionId,
    /// Filter expression
    #[serde(default)]
    pub filters: String,
    /// Page size
    pub limit: u32,
    /// Continuation token from a previous page
    #[serde(default)]
    pub token: String,
    /// Sort order
    #[serde(default)]
    pub sort_by: Option<Sort>,
    /// Also return nodes produced by dynamic tasks
    #[serde(default)]
    pub include_child_nodes: bool,
}

/// Request for a page of nodes produced by one task attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeExecutionForTaskListRequest {
    /// Parent task attempt
    pub task_execution_id: TaskExecutionId,
    /// Filter expression
    #[serde(default)]
    pub filters: String,
    /// Page size
    pub limit: u32,
    /// Continuation token from a previous page
    #[serde(default)]
    pub token: String,
    /// Sort order
    #[serde(default)]
    pub sort_by: Option<Sort>,
}

/// A page of node executions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeExecutionList {
    /// Nodes on this page
    pub node_executions: Vec<NodeExecution>,
    /// Token for the next page; empty on the last page
    pub token: String,
}
