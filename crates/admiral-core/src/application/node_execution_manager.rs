//! Node execution lifecycle: event ingestion and read-back.

use crate::application::execution_manager::MAX_UPDATE_ATTEMPTS;
use crate::application::metrics::{self, Metrics};
use crate::application::validation;
use crate::domain::execution::ExecutionData;
use crate::domain::identifier::NodeExecutionId;
use crate::domain::list::{self, InlineFilter, ListResourceInput, MapFilter};
use crate::domain::node_execution::{
    NodeExecution, NodeExecutionEvent, NodeExecutionEventRecord, NodeExecutionEventRequest,
    NodeExecutionForTaskListRequest, NodeExecutionList, NodeExecutionListRequest,
};
use crate::domain::phase::{validate_transition, NodeExecutionPhase, Phase, TransitionRejection};
use crate::domain::repository::Repositories;
use crate::error::CoreError;
use admiral_content_store::{RemoteUrl, UrlBlob};
use admiral_monitoring::MetricsCollector;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// How an accepted or refused node event landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeEventOutcome {
    /// First event of the node; the record was created
    Created,
    /// The record was updated in place
    Updated,
    /// The node already finished
    AlreadyTerminal {
        /// The terminal phase on record
        current: NodeExecutionPhase,
    },
}

/// Owns the node execution state machine
pub struct NodeExecutionManager {
    repositories: Repositories,
    remote_url: Arc<dyn RemoteUrl>,
    metrics: Metrics,
}

impl NodeExecutionManager {
    /// Create a new node execution manager
    pub fn new(repositories: Repositories, remote_url: Arc<dyn RemoteUrl>, collector: Arc<dyn MetricsCollector>) -> Self {
        Self {
            repositories,
            remote_url,
            metrics: Metrics::new(collector),
        }
    }

    /// Apply a node event, refusing events for finished nodes
    pub async fn record_node_event(&self, request: NodeExecutionEventRequest) -> Result<(), CoreError> {
        match self.apply_node_event(request.clone()).await? {
            NodeEventOutcome::AlreadyTerminal { current } => {
                let rejection = TransitionRejection::AlreadyTerminal {
                    current,
                    reported: request.event.phase,
                };
                Err(rejection.into_error(&request.event.id))
            }
            NodeEventOutcome::Created | NodeEventOutcome::Updated => Ok(()),
        }
    }

    /// Apply a node event and report how it landed
    pub async fn apply_node_event(&self, request: NodeExecutionEventRequest) -> Result<NodeEventOutcome, CoreError> {
        validation::validate_node_event_request(&request)?;
        let event = &request.event;
        let occurred_at = event.occurred_at.unwrap_or_else(Utc::now);

        if let Err(err) = self.repositories.executions.get(&event.id.execution_id).await {
            self.metrics.inc(metrics::MISSING_WORKFLOW_EXECUTION);
            debug!(execution_id = %event.id.execution_id, error = %err, "node event for unknown execution");
            return Err(err.with_message(format!(
                "failed to get existing execution id: [{}]",
                event.id.execution_id
            )));
        }

        let outcome = match self.repositories.node_executions.get(&event.id).await {
            Ok(node) => self.update_node(&request, node, occurred_at).await?,
            Err(CoreError::NotFound(_)) => self.create_node(&request, occurred_at).await?,
            Err(err) => return Err(err),
        };

        if !matches!(outcome, NodeEventOutcome::AlreadyTerminal { .. }) {
            self.metrics.inc(metrics::NODE_EXECUTION_EVENTS_CREATED);
        }
        Ok(outcome)
    }

    async fn create_node(
        &self,
        request: &NodeExecutionEventRequest,
        occurred_at: DateTime<Utc>,
    ) -> Result<NodeEventOutcome, CoreError> {
        let event = &request.event;
        let parent_task_execution_id = match &event.parent_task_metadata {
            Some(parent) => {
                let task = self.repositories.task_executions.get(&parent.id).await.map_err(|err| {
                    debug!(node_execution_id = %event.id, task = %parent.id, error = %err, "unknown parent task");
                    err
                })?;
                Some(task.internal_id)
            }
            None => None,
        };

        let node = NodeExecution::from_event(event, occurred_at, parent_task_execution_id);
        let record = NodeExecutionEventRecord::from_request(request, occurred_at, Utc::now());
        match self.repositories.node_executions.create(record, node).await {
            Ok(created) => {
                self.metrics.inc(metrics::NODE_EXECUTIONS_CREATED);
                self.metrics
                    .observe_size(metrics::NODE_CLOSURE_SIZE_BYTES, &created.closure);
                self.count_transition(None, &created);
                debug!(node_execution_id = %created.id, phase = %created.phase(), "created node execution");
                Ok(NodeEventOutcome::Created)
            }
            Err(CoreError::AlreadyExists(_)) => {
                debug!(node_execution_id = %event.id, "lost node create race, retrying as update");
                let existing = self.repositories.node_executions.get(&event.id).await?;
                self.update_node(request, existing, occurred_at).await
            }
            Err(err) => Err(err),
        }
    }

    async fn update_node(
        &self,
        request: &NodeExecutionEventRequest,
        mut node: NodeExecution,
        occurred_at: DateTime<Utc>,
    ) -> Result<NodeEventOutcome, CoreError> {
        let event = &request.event;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let current_phase = node.phase();
            match validate_transition(current_phase, event.phase) {
                Ok(()) => {}
                Err(TransitionRejection::AlreadyTerminal { current, .. }) => {
                    debug!(node_execution_id = %event.id, current = %current, reported = %event.phase, "node already terminal");
                    return Ok(NodeEventOutcome::AlreadyTerminal { current });
                }
                Err(rejection) => return Err(rejection.into_error(&event.id)),
            }
            if attempt == 1 {
                self.ensure_child_exists(event).await?;
            }

            let previous = node.clone();
            node.apply_event(event, occurred_at);
            let record = NodeExecutionEventRecord::from_request(request, occurred_at, Utc::now());
            match self
                .repositories
                .node_executions
                .update_with_event(record, &node, current_phase)
                .await
            {
                Ok(()) => {
                    self.count_transition(Some(&previous), &node);
                    return Ok(NodeEventOutcome::Updated);
                }
                Err(CoreError::ConcurrentModification(reason)) if attempt < MAX_UPDATE_ATTEMPTS => {
                    debug!(node_execution_id = %event.id, attempt, %reason, "retrying node event");
                    node = self.repositories.node_executions.get(&event.id).await?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn ensure_child_exists(&self, event: &NodeExecutionEvent) -> Result<(), CoreError> {
        let Some(metadata) = &event.workflow_node_metadata else {
            return Ok(());
        };
        validation::validate_workflow_execution_id(&metadata.execution_id)?;
        self.repositories.executions.get(&metadata.execution_id).await.map_err(|err| {
            debug!(child = %metadata.execution_id, error = %err, "node reported unknown child execution");
            err
        })?;
        Ok(())
    }

    fn count_transition(&self, previous: Option<&NodeExecution>, node: &NodeExecution) {
        let was_started = previous.map_or(false, |p| p.closure.started_at.is_some());
        let is_started = node.closure.started_at.is_some();
        if is_started && !was_started {
            self.metrics.gauge(metrics::ACTIVE_NODE_EXECUTIONS, 1.0);
        }
        if node.phase().is_terminal() {
            if is_started {
                self.metrics.gauge(metrics::ACTIVE_NODE_EXECUTIONS, -1.0);
            }
            self.metrics.inc(metrics::NODE_EXECUTIONS_TERMINATED);
        }
    }

    /// Read a node execution
    pub async fn get_node_execution(&self, id: &NodeExecutionId) -> Result<NodeExecution, CoreError> {
        validation::validate_node_execution_id(id)?;
        self.repositories.node_executions.get(id).await.map_err(|err| {
            debug!(node_execution_id = %id, error = %err, "failed to get node execution");
            err
        })
    }

    /// A page of the nodes of one execution
    pub async fn list_node_executions(&self, request: NodeExecutionListRequest) -> Result<NodeExecutionList, CoreError> {
        validation::validate_node_list_request(&request)?;
        let id = &request.workflow_execution_id;
        let mut filters = vec![
            InlineFilter::eq("execution_project", id.project.clone()),
            InlineFilter::eq("execution_domain", id.domain.clone()),
            InlineFilter::eq("execution_name", id.name.clone()),
        ];
        filters.extend(list::parse_filters(&request.filters)?);
        let map_filters = if request.include_child_nodes {
            Vec::new()
        } else {
            vec![MapFilter::is_null("parent_task_execution_id")]
        };
        self.list(filters, map_filters, request.limit, &request.token, request.sort_by)
            .await
    }

    /// A page of the nodes produced by one task attempt
    pub async fn list_node_executions_for_task(
        &self,
        request: NodeExecutionForTaskListRequest,
    ) -> Result<NodeExecutionList, CoreError> {
        validation::validate_node_for_task_list_request(&request)?;
        let task = self
            .repositories
            .task_executions
            .get(&request.task_execution_id)
            .await?;
        let mut filters = vec![InlineFilter::eq(
            "parent_task_execution_id",
            task.internal_id.to_string(),
        )];
        filters.extend(list::parse_filters(&request.filters)?);
        self.list(filters, Vec::new(), request.limit, &request.token, request.sort_by)
            .await
    }

    async fn list(
        &self,
        filters: Vec<InlineFilter>,
        map_filters: Vec<MapFilter>,
        limit: u32,
        token: &str,
        sort: Option<list::Sort>,
    ) -> Result<NodeExecutionList, CoreError> {
        list::validate_fields::<NodeExecution>(&filters, sort.as_ref())?;
        let offset = list::parse_token(token)?;
        let input = ListResourceInput {
            limit: limit as usize,
            offset,
            filters,
            map_filters,
            sort,
        };
        let node_executions = self.repositories.node_executions.list(&input).await?;
        let token = list::next_token(offset, node_executions.len(), input.limit);
        Ok(NodeExecutionList { node_executions, token })
    }

    /// Data-access locations of a node's inputs and outputs
    pub async fn get_node_execution_data(&self, id: &NodeExecutionId) -> Result<ExecutionData, CoreError> {
        let node = self.get_node_execution(id).await?;
        let inputs = if node.input_uri.is_empty() {
            UrlBlob::default()
        } else {
            self.remote_url.get(&node.input_uri).await?
        };
        let outputs = match node.closure.output_uri.as_deref() {
            Some(uri) if !uri.is_empty() => self.remote_url.get(uri).await?,
            _ => UrlBlob::default(),
        };
        Ok(ExecutionData { inputs, outputs })
    }
}
