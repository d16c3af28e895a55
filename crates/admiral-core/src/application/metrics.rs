//! Metric names and a thin recording helper for the managers.

use admiral_monitoring::{MetricType, MetricsCollector};
use std::collections::HashMap;
use std::sync::Arc;

/// Executions created and not yet terminal
pub const ACTIVE_EXECUTIONS: &str = "active_executions";
/// Executions created
pub const EXECUTIONS_CREATED: &str = "executions_created";
/// Executions that reached a terminal phase
pub const EXECUTIONS_TERMINATED: &str = "executions_terminated";
/// Accepted execution events
pub const EXECUTION_EVENTS_CREATED: &str = "execution_events_created";
/// Dispatches rejected by the workflow executor
pub const PROPELLER_FAILURES: &str = "propeller_failures";
/// Notifications that could not be published
pub const PUBLISH_ERROR: &str = "publish_error";
/// Records that could not be serialized for size accounting
pub const TRANSFORMER_ERROR: &str = "transformer_error";
/// Stored data that could not be interpreted
pub const UNEXPECTED_DATA_ERROR: &str = "unexpected_data_error";
/// Serialized spec size
pub const SPEC_SIZE_BYTES: &str = "spec_size_bytes";
/// Serialized closure size
pub const CLOSURE_SIZE_BYTES: &str = "closure_size_bytes";
/// Seconds from submission to acceptance
pub const ACCEPTANCE_DELAY: &str = "acceptance_delay";
/// Seconds from scheduled kickoff to running, per project/domain
pub const SCHEDULED_EXECUTION_DELAY: &str = "scheduled_execution_delay";
/// Seconds from creation to terminal, per project/domain
pub const WORKFLOW_EXECUTION_DURATION: &str = "workflow_execution_duration";

/// Nodes running and not yet terminal
pub const ACTIVE_NODE_EXECUTIONS: &str = "active_node_executions";
/// Nodes created
pub const NODE_EXECUTIONS_CREATED: &str = "node_executions_created";
/// Nodes that reached a terminal phase
pub const NODE_EXECUTIONS_TERMINATED: &str = "node_executions_terminated";
/// Accepted node events
pub const NODE_EXECUTION_EVENTS_CREATED: &str = "node_execution_events_created";
/// Node events for executions that do not exist
pub const MISSING_WORKFLOW_EXECUTION: &str = "missing_workflow_execution";
/// Serialized node closure size
pub const NODE_CLOSURE_SIZE_BYTES: &str = "node_closure_size_bytes";

/// Background tasks dropped by a saturated pool
pub const BACKGROUND_TASKS_REJECTED: &str = "background_tasks_rejected";

/// Unlabelled recording shortcuts over a collector
#[derive(Clone)]
pub struct Metrics {
    collector: Arc<dyn MetricsCollector>,
}

impl Metrics {
    /// Wrap a collector
    pub fn new(collector: Arc<dyn MetricsCollector>) -> Self {
        Self { collector }
    }

    /// Underlying collector
    pub fn collector(&self) -> Arc<dyn MetricsCollector> {
        self.collector.clone()
    }

    /// Increment a counter by one
    pub fn inc(&self, name: &str) {
        self.collector.record_metric(name, 1.0, MetricType::Counter, HashMap::new());
    }

    /// Move a gauge by `delta`
    pub fn gauge(&self, name: &str, delta: f64) {
        self.collector.record_metric(name, delta, MetricType::Gauge, HashMap::new());
    }

    /// Record one observation
    pub fn observe(&self, name: &str, value: f64) {
        self.collector.record_metric(name, value, MetricType::Summary, HashMap::new());
    }

    /// Record the serialized size of `value`, or count a transformer error
    pub fn observe_size<T: serde::Serialize>(&self, name: &str, value: &T) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.observe(name, bytes.len() as f64),
            Err(_) => self.inc(TRANSFORMER_ERROR),
        }
    }
}
