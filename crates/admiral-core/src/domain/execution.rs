use crate::domain::identifier::{Identifier, NodeExecutionId, WorkflowExecutionId};
use crate::domain::list::Sort;
use crate::domain::literal::LiteralMap;
use crate::domain::notification::{NotificationOverrides, NotificationSetting};
use crate::domain::phase::{Phase, WorkflowExecutionPhase};
use admiral_content_store::{DataReference, UrlBlob};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How an execution was started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Started by a user
    #[default]
    Manual,
    /// Started by a schedule
    Scheduled,
    /// Started by the platform, e.g. a sub-workflow
    System,
    /// Started by relaunching another execution
    Relaunch,
}

impl ExecutionMode {
    /// Lower-case name used in filters
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Manual => "manual",
            ExecutionMode::Scheduled => "scheduled",
            ExecutionMode::System => "system",
            ExecutionMode::Relaunch => "relaunch",
        }
    }
}

/// Who started an execution, how, and from where
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    /// Launch mode
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Requesting user or service
    #[serde(default)]
    pub principal: String,
    /// Sub-workflow depth, 0 for top level executions
    #[serde(default)]
    pub nesting: u32,
    /// Schedule time for scheduled executions
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Node that launched this execution as a sub-workflow
    #[serde(default)]
    pub parent_node_execution: Option<NodeExecutionId>,
    /// Execution this one was relaunched from; filled on read
    #[serde(default)]
    pub reference_execution: Option<WorkflowExecutionId>,
}

/// Immutable request-time description of an execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSpec {
    /// Launch plan to run
    pub launch_plan: Identifier,
    /// User inputs kept inline by records that predate offloading
    #[serde(default)]
    pub inputs: Option<LiteralMap>,
    /// Launch metadata
    #[serde(default)]
    pub metadata: ExecutionMetadata,
    /// Notification choice of the caller
    #[serde(default)]
    pub notifications: NotificationOverrides,
    /// Labels; `None` inherits from the launch plan
    #[serde(default)]
    pub labels: Option<HashMap<String, String>>,
    /// Annotations; `None` inherits from the launch plan
    #[serde(default)]
    pub annotations: Option<HashMap<String, String>>,
}

/// Error reported by the engine for a failed execution or node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    /// Machine readable code
    pub code: String,
    /// Human readable message
    pub message: String,
    /// Location of the full error document
    #[serde(default)]
    pub error_uri: Option<String>,
}

/// Mutable state of an execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionClosure {
    /// Current phase
    pub phase: WorkflowExecutionPhase,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// When the execution first entered running
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the last event was applied
    pub updated_at: DateTime<Utc>,
    /// When a terminal phase was recorded
    #[serde(default)]
    pub terminal_at: Option<DateTime<Utc>>,
    /// Run time in milliseconds, set on terminal phases
    #[serde(default)]
    pub duration_ms: Option<i64>,
    /// Cluster the execution was dispatched to
    #[serde(default)]
    pub cluster: String,
    /// Cause given when the execution was terminated
    #[serde(default)]
    pub abort_cause: Option<String>,
    /// Location of the outputs of a successful run
    #[serde(default)]
    pub outputs_uri: Option<String>,
    /// Error of a failed run
    #[serde(default)]
    pub error: Option<ExecutionError>,
    /// Resolved inputs kept inline by records that predate offloading
    #[serde(default)]
    pub computed_inputs: Option<LiteralMap>,
    /// Notifications resolved at creation
    #[serde(default)]
    pub notifications: Vec<NotificationSetting>,
    /// Workflow the launch plan resolved to
    #[serde(default)]
    pub workflow_id: Identifier,
}

/// A workflow execution record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// Storage-assigned id
    pub internal_id: u64,
    /// Identity
    pub id: WorkflowExecutionId,
    /// Immutable request-time description
    pub spec: ExecutionSpec,
    /// Mutable state
    pub closure: ExecutionClosure,
    /// Internal id of the launch plan
    #[serde(default)]
    pub launch_plan_internal_id: u64,
    /// Internal id of the workflow
    #[serde(default)]
    pub workflow_internal_id: u64,
    /// Offloaded resolved inputs; absent on legacy records
    #[serde(default)]
    pub inputs_uri: Option<DataReference>,
    /// Offloaded user inputs; absent on legacy records
    #[serde(default)]
    pub user_inputs_uri: Option<DataReference>,
    /// Internal id of the execution this one was relaunched from
    #[serde(default)]
    pub source_execution_id: Option<u64>,
    /// Internal id of the node that launched this execution
    #[serde(default)]
    pub parent_node_execution_id: Option<u64>,
}

impl WorkflowExecution {
    /// Current phase
    pub fn phase(&self) -> WorkflowExecutionPhase {
        self.closure.phase
    }

    /// Apply an accepted event to the closure.
    ///
    /// Callers must have validated the transition first.
    pub fn apply_event(&mut self, event: &WorkflowExecutionEvent, occurred_at: DateTime<Utc>) {
        let closure = &mut self.closure;
        closure.phase = event.phase;
        closure.updated_at = occurred_at;
        if !event.producer_id.is_empty() {
            closure.cluster = event.producer_id.clone();
        }
        if event.phase == WorkflowExecutionPhase::Running && closure.started_at.is_none() {
            closure.started_at = Some(occurred_at);
        }
        if event.phase.is_terminal() {
            let since = closure.started_at.unwrap_or(closure.created_at);
            closure.terminal_at = Some(occurred_at);
            closure.duration_ms = Some((occurred_at - since).num_milliseconds());
        }
        match &event.output {
            Some(EventOutput::Uri(uri)) if event.phase == WorkflowExecutionPhase::Succeeded => {
                closure.outputs_uri = Some(uri.clone());
            }
            Some(EventOutput::Error(error)) if event.phase == WorkflowExecutionPhase::Failed => {
                closure.error = Some(error.clone());
            }
            _ => {}
        }
    }
}

/// Result reported alongside a phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutput {
    /// Location of the outputs
    Uri(String),
    /// Failure details
    Error(ExecutionError),
}

/// Phase change reported by the engine for an execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowExecutionEvent {
    /// Target execution
    pub execution_id: WorkflowExecutionId,
    /// Cluster that produced the event
    #[serde(default)]
    pub producer_id: String,
    /// Reported phase
    pub phase: WorkflowExecutionPhase,
    /// When the phase change happened
    pub occurred_at: Option<DateTime<Utc>>,
    /// Outputs or error
    #[serde(default)]
    pub output: Option<EventOutput>,
}

/// An execution event plus its idempotency key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowExecutionEventRequest {
    /// Idempotency key
    pub request_id: String,
    /// The event
    pub event: WorkflowExecutionEvent,
}

/// Accepted execution event, appended to the audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionEventRecord {
    /// Idempotency key of the request
    pub request_id: String,
    /// Target execution
    pub execution_id: WorkflowExecutionId,
    /// Accepted phase
    pub phase: WorkflowExecutionPhase,
    /// When the phase change happened
    pub occurred_at: DateTime<Utc>,
    /// Cluster that produced the event
    pub producer_id: String,
    /// When the event was accepted
    pub recorded_at: DateTime<Utc>,
}

impl ExecutionEventRecord {
    /// Build the record for an accepted request
    pub fn from_request(request: &WorkflowExecutionEventRequest, occurred_at: DateTime<Utc>, recorded_at: DateTime<Utc>) -> Self {
        Self {
            request_id: request.request_id.clone(),
            execution_id: request.event.execution_id.clone(),
            phase: request.event.phase,
            occurred_at,
            producer_id: request.event.producer_id.clone(),
            recorded_at,
        }
    }
}

/// Request to launch a new execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionCreateRequest {
    /// Owning project
    pub project: String,
    /// Domain within the project
    pub domain: String,
    /// Execution name; generated when empty
    #[serde(default)]
    pub name: String,
    /// What to run and how
    pub spec: ExecutionSpec,
    /// User inputs
    #[serde(default)]
    pub inputs: Option<LiteralMap>,
}

/// Request to relaunch an existing execution under a new name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRelaunchRequest {
    /// Execution to relaunch
    pub id: WorkflowExecutionId,
    /// Name of the new execution; generated when empty
    #[serde(default)]
    pub name: String,
}

/// Request to abort a running execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTerminateRequest {
    /// Execution to abort
    pub id: WorkflowExecutionId,
    /// Reason recorded on the execution
    #[serde(default)]
    pub cause: String,
}

/// Data-access locations of an execution or node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionData {
    /// Inputs
    pub inputs: UrlBlob,
    /// Outputs; empty while none were produced
    pub outputs: UrlBlob,
}

/// Request for a page of executions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceListRequest {
    /// Project to list
    pub project: String,
    /// Domain to list
    pub domain: String,
    /// Optional exact name
    #[serde(default)]
    pub name: Option<String>,
    /// Filter expression, e.g. `eq(phase,RUNNING)+gte(created_at,...)`
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

/// A page of executions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionList {
    /// Executions on this page
    pub executions: Vec<WorkflowExecution>,
    /// Token for the next page; empty on the last page
    pub token: String,
}
