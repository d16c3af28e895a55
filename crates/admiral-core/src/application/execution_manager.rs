//! Workflow execution lifecycle: create, relaunch, event ingestion, termination
//! and read-back.

use crate::application::background::BackgroundPool;
use crate::application::inputs::{
    offload_literal_map, read_literal_map, read_user_inputs, INPUTS_KEY, USER_INPUTS_KEY,
};
use crate::application::metrics::{self, Metrics};
use crate::application::notifications;
use crate::application::queue_allocator::QueueAllocator;
use crate::application::resources;
use crate::application::validation;
use crate::config::{ApplicationConfig, QueueConfigProvider};
use crate::domain::execution::{
    EventOutput, ExecutionClosure, ExecutionCreateRequest, ExecutionData, ExecutionEventRecord, ExecutionList,
    ExecutionMode, ExecutionRelaunchRequest, ExecutionTerminateRequest, ResourceListRequest, WorkflowExecution,
    WorkflowExecutionEventRequest,
};
use crate::domain::identifier::WorkflowExecutionId;
use crate::domain::launch_plan::LaunchPlan;
use crate::domain::list::{self, InlineFilter, ListResourceInput};
use crate::domain::literal::LiteralMap;
use crate::domain::notification::{NotificationOverrides, EMAIL_NOTIFICATION_TYPE};
use crate::domain::phase::{validate_transition, Phase, WorkflowExecutionPhase};
use crate::domain::ports::{ExecuteWorkflowInput, Publisher, TerminateWorkflowInput, WorkflowExecutor};
use crate::domain::repository::{LaunchPlanRepository, Repositories};
use crate::error::CoreError;
use admiral_content_store::{ContentStorage, RemoteUrl, UrlBlob};
use admiral_monitoring::{MetricsCollector, ScopedStopWatches};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Attempts at a compare-and-set write before giving up
pub const MAX_UPDATE_ATTEMPTS: usize = 3;

const GENERATED_NAME_LENGTH: usize = 19;

/// `f` followed by 19 lowercase alphanumerics
pub fn generate_execution_name() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("f{}", &random[..GENERATED_NAME_LENGTH])
}

/// Request-level notifications win when non-empty, `DisableAll` clears,
/// anything else inherits from the launch plan.
fn resolve_notifications(
    overrides: &NotificationOverrides,
    launch_plan: &LaunchPlan,
) -> Vec<crate::domain::notification::NotificationSetting> {
    match overrides {
        NotificationOverrides::Notifications(settings) if !settings.is_empty() => settings.clone(),
        NotificationOverrides::DisableAll => Vec::new(),
        _ => launch_plan.spec.entity_metadata.notifications.clone(),
    }
}

fn resolve_map(
    requested: &Option<HashMap<String, String>>,
    inherited: &Option<HashMap<String, String>>,
) -> Option<HashMap<String, String>> {
    requested.clone().or_else(|| inherited.clone())
}

/// Owns the workflow execution state machine
pub struct ExecutionManager {
    /// Persistence
    repositories: Repositories,
    config: Arc<ApplicationConfig>,
    /// Offloaded payloads
    store: Arc<dyn ContentStorage>,
    remote_url: Arc<dyn RemoteUrl>,
    executor: Arc<dyn WorkflowExecutor>,
    queue_allocator: QueueAllocator,
    publisher: Arc<dyn Publisher>,
    metrics: Metrics,
    /// Detached metric side effects
    background: Arc<BackgroundPool>,
    scheduled_delays: Arc<ScopedStopWatches>,
    execution_durations: Arc<ScopedStopWatches>,
}

impl ExecutionManager {
    /// Create a new execution manager
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repositories: Repositories,
        config: Arc<ApplicationConfig>,
        store: Arc<dyn ContentStorage>,
        remote_url: Arc<dyn RemoteUrl>,
        executor: Arc<dyn WorkflowExecutor>,
        queue_config: Arc<dyn QueueConfigProvider>,
        publisher: Arc<dyn Publisher>,
        collector: Arc<dyn MetricsCollector>,
    ) -> Self {
        let background = Arc::new(BackgroundPool::new(config.background_workers, collector.clone()));
        Self {
            repositories,
            store,
            remote_url,
            executor,
            queue_allocator: QueueAllocator::new(queue_config),
            publisher,
            metrics: Metrics::new(collector.clone()),
            background,
            scheduled_delays: Arc::new(ScopedStopWatches::new(
                metrics::SCHEDULED_EXECUTION_DELAY,
                collector.clone(),
            )),
            execution_durations: Arc::new(ScopedStopWatches::new(metrics::WORKFLOW_EXECUTION_DURATION, collector)),
            config,
        }
    }

    /// Pool running the detached side effects
    pub fn background(&self) -> Arc<BackgroundPool> {
        self.background.clone()
    }

    /// Validate, dispatch and persist a new execution
    pub async fn create_execution(
        &self,
        mut request: ExecutionCreateRequest,
        submitted_at: DateTime<Utc>,
    ) -> Result<WorkflowExecutionId, CoreError> {
        // Older clients only set the spec-level inputs.
        if request.inputs.as_ref().map_or(true, LiteralMap::is_empty) {
            request.inputs = request.spec.inputs.clone();
        }
        let execution = self.launch_execution(request, submitted_at).await?;
        let created = self.persist_new_execution(execution).await?;
        Ok(created.id)
    }

    /// Launch a copy of an existing execution with its original user inputs
    pub async fn relaunch_execution(
        &self,
        request: ExecutionRelaunchRequest,
        submitted_at: DateTime<Utc>,
    ) -> Result<WorkflowExecutionId, CoreError> {
        validation::validate_workflow_execution_id(&request.id)?;
        let source = self.repositories.executions.get(&request.id).await.map_err(|err| {
            debug!(execution_id = %request.id, error = %err, "failed to get execution for relaunch");
            err
        })?;
        let user_inputs = read_user_inputs(self.store.as_ref(), &source).await?;

        let mut spec = source.spec.clone();
        spec.inputs = None;
        spec.metadata.mode = ExecutionMode::Relaunch;
        spec.metadata.reference_execution = None;

        let create_request = ExecutionCreateRequest {
            project: request.id.project.clone(),
            domain: request.id.domain.clone(),
            name: request.name,
            spec,
            inputs: Some(user_inputs),
        };
        let mut execution = self.launch_execution(create_request, submitted_at).await?;
        execution.source_execution_id = Some(source.internal_id);

        let created = self.persist_new_execution(execution).await?;
        debug!(source = %request.id, execution_id = %created.id, "relaunched execution");
        Ok(created.id)
    }

    /// Everything up to and including dispatch. Nothing is persisted here.
    async fn launch_execution(
        &self,
        request: ExecutionCreateRequest,
        submitted_at: DateTime<Utc>,
    ) -> Result<WorkflowExecution, CoreError> {
        validation::validate_execution_request(&request, &self.config.registration).map_err(|err| {
            debug!(project = %request.project, domain = %request.domain, error = %err, "invalid create request");
            err
        })?;

        let launch_plan = self.repositories.launch_plans.get(&request.spec.launch_plan).await?;
        let user_inputs = request.inputs.clone().unwrap_or_default();
        let inputs = validation::check_and_fetch_inputs(
            &user_inputs,
            &launch_plan.spec.fixed_inputs,
            &launch_plan.closure.expected_inputs,
        )?;
        let workflow = self.repositories.workflows.get(&launch_plan.spec.workflow_id).await?;

        let name = if request.name.is_empty() {
            generate_execution_name()
        } else {
            request.name.clone()
        };
        let execution_id = WorkflowExecutionId::new(request.project.clone(), request.domain.clone(), name);
        // Offloading writes to the id-derived references, so an existing
        // execution must be rejected before anything is written or dispatched.
        self.ensure_absent(&execution_id).await?;

        let parent_node_execution_id = match &request.spec.metadata.parent_node_execution {
            Some(parent) => Some(self.repositories.node_executions.get(parent).await?.internal_id),
            None => None,
        };

        let mut compiled = workflow.closure.clone();
        for task in compiled.tasks.iter_mut() {
            resources::set_defaults(&self.config.task_resources, task);
            resources::validate_task_resources(&self.config.task_resources, task)?;
        }
        self.queue_allocator.annotate(&workflow.id, &mut compiled);

        let inputs_uri = offload_literal_map(
            self.store.as_ref(),
            &self.config.metadata_prefix,
            &execution_id,
            INPUTS_KEY,
            &inputs,
        )
        .await?;
        let user_inputs_uri = offload_literal_map(
            self.store.as_ref(),
            &self.config.metadata_prefix,
            &execution_id,
            USER_INPUTS_KEY,
            &user_inputs,
        )
        .await?;

        let notifications = resolve_notifications(&request.spec.notifications, &launch_plan);
        let labels = resolve_map(&request.spec.labels, &launch_plan.spec.labels);
        let annotations = resolve_map(&request.spec.annotations, &launch_plan.spec.annotations);
        validation::validate_map_size(self.config.registration.max_label_entries, labels.as_ref(), "labels")?;
        validation::validate_map_size(
            self.config.registration.max_annotation_entries,
            annotations.as_ref(),
            "annotations",
        )?;

        let accepted_at = Utc::now();
        let dispatched = self
            .executor
            .execute_workflow(ExecuteWorkflowInput {
                execution_id: execution_id.clone(),
                workflow: compiled,
                inputs,
                reference: launch_plan.clone(),
                accepted_at,
                labels: labels.clone().unwrap_or_default(),
                annotations: annotations.clone().unwrap_or_default(),
            })
            .await;
        let info = match dispatched {
            Ok(info) => info,
            Err(err) => {
                self.metrics.inc(metrics::PROPELLER_FAILURES);
                info!(execution_id = %execution_id, error = %err, "failed to dispatch execution");
                return Err(err);
            }
        };

        let now = Utc::now();
        let delay = now.signed_duration_since(submitted_at).num_milliseconds() as f64 / 1000.0;
        self.metrics.observe(metrics::ACCEPTANCE_DELAY, delay);

        let mut spec = request.spec;
        spec.inputs = None;
        spec.labels = labels;
        spec.annotations = annotations;

        Ok(WorkflowExecution {
            internal_id: 0,
            id: execution_id,
            spec,
            closure: ExecutionClosure {
                phase: WorkflowExecutionPhase::Undefined,
                created_at: now,
                updated_at: now,
                cluster: info.cluster,
                notifications,
                workflow_id: workflow.id.clone(),
                ..Default::default()
            },
            launch_plan_internal_id: launch_plan.internal_id,
            workflow_internal_id: workflow.internal_id,
            inputs_uri: Some(inputs_uri),
            user_inputs_uri: Some(user_inputs_uri),
            source_execution_id: None,
            parent_node_execution_id,
        })
    }

    async fn ensure_absent(&self, id: &WorkflowExecutionId) -> Result<(), CoreError> {
        match self.repositories.executions.get(id).await {
            Ok(_) => {
                debug!(execution_id = %id, "execution already exists");
                Err(CoreError::AlreadyExists(format!("execution {} already exists", id)))
            }
            Err(CoreError::NotFound(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn persist_new_execution(&self, execution: WorkflowExecution) -> Result<WorkflowExecution, CoreError> {
        let created = self.repositories.executions.create(execution).await.map_err(|err| {
            info!(error = %err, "failed to persist execution");
            err
        })?;
        self.metrics.gauge(metrics::ACTIVE_EXECUTIONS, 1.0);
        self.metrics.inc(metrics::EXECUTIONS_CREATED);
        self.metrics.observe_size(metrics::SPEC_SIZE_BYTES, &created.spec);
        self.metrics.observe_size(metrics::CLOSURE_SIZE_BYTES, &created.closure);
        info!(execution_id = %created.id, cluster = %created.closure.cluster, "created execution");
        Ok(created)
    }

    /// Apply a phase change reported by the engine
    pub async fn record_execution_event(&self, request: WorkflowExecutionEventRequest) -> Result<(), CoreError> {
        validation::validate_workflow_event_request(&request)?;
        let event = &request.event;
        let occurred_at = event.occurred_at.unwrap_or_else(Utc::now);
        debug!(
            execution_id = %event.execution_id,
            phase = %event.phase,
            request_id = %request.request_id,
            "received execution event"
        );

        let mut attempt = 0;
        let execution = loop {
            attempt += 1;
            let mut execution = self.repositories.executions.get(&event.execution_id).await.map_err(|err| {
                debug!(execution_id = %event.execution_id, error = %err, "failed to get execution");
                err
            })?;
            let current_phase = execution.phase();
            if let Err(rejection) = validate_transition(current_phase, event.phase) {
                debug!(
                    execution_id = %event.execution_id,
                    current = %current_phase,
                    reported = %event.phase,
                    "rejected execution event"
                );
                return Err(rejection.into_error(&event.execution_id));
            }

            execution.apply_event(event, occurred_at);
            let record = ExecutionEventRecord::from_request(&request, occurred_at, Utc::now());
            match self
                .repositories
                .executions
                .update_with_event(record, &execution, current_phase)
                .await
            {
                Ok(()) => break execution,
                Err(CoreError::ConcurrentModification(reason)) if attempt < MAX_UPDATE_ATTEMPTS => {
                    debug!(execution_id = %event.execution_id, attempt, %reason, "retrying execution event");
                }
                Err(err) => return Err(err),
            }
        };

        if event.phase == WorkflowExecutionPhase::Running
            && execution.spec.metadata.mode == ExecutionMode::Scheduled
        {
            self.spawn_scheduled_delay(&execution, occurred_at);
        } else if event.phase.is_terminal() {
            self.metrics.gauge(metrics::ACTIVE_EXECUTIONS, -1.0);
            self.metrics.inc(metrics::EXECUTIONS_TERMINATED);
            self.spawn_execution_duration(&execution, occurred_at);
            self.publish_notifications(&request, &execution).await?;
        }

        self.metrics.inc(metrics::EXECUTION_EVENTS_CREATED);
        Ok(())
    }

    fn spawn_scheduled_delay(&self, execution: &WorkflowExecution, running_at: DateTime<Utc>) {
        let launch_plans = self.repositories.launch_plans.clone();
        let store = self.store.clone();
        let watches = self.scheduled_delays.clone();
        let execution = execution.clone();
        self.background.submit(metrics::SCHEDULED_EXECUTION_DELAY, async move {
            observe_scheduled_delay(launch_plans, store, watches, execution, running_at).await;
        });
    }

    fn spawn_execution_duration(&self, execution: &WorkflowExecution, terminal_at: DateTime<Utc>) {
        let watches = self.execution_durations.clone();
        let id = execution.id.clone();
        let created_at = execution.closure.created_at;
        self.background.submit(metrics::WORKFLOW_EXECUTION_DURATION, async move {
            watches.observe(&id.project, &id.domain, created_at, terminal_at);
        });
    }

    async fn publish_notifications(
        &self,
        request: &WorkflowExecutionEventRequest,
        execution: &WorkflowExecution,
    ) -> Result<(), CoreError> {
        let phase = request.event.phase;
        let notifications = match notifications::normalize(&execution.closure.notifications, phase) {
            Ok(notifications) => notifications,
            Err(err) => {
                self.metrics.inc(metrics::UNEXPECTED_DATA_ERROR);
                debug!(execution_id = %execution.id, error = %err, "failed to normalize notifications");
                return Err(err);
            }
        };
        let error = match &request.event.output {
            Some(EventOutput::Error(error)) => Some(error),
            _ => None,
        };
        for notification in notifications {
            let message = notifications::to_email_message(
                &self.config.notifications,
                &notification,
                &execution.id,
                phase,
                error,
            );
            if let Err(err) = self.publisher.publish(EMAIL_NOTIFICATION_TYPE, &message).await {
                self.metrics.inc(metrics::PUBLISH_ERROR);
                info!(
                    execution_id = %execution.id,
                    recipients = ?message.recipients_email,
                    error = %err,
                    "failed to publish notification"
                );
            }
        }
        Ok(())
    }

    /// Read an execution, filling the legacy inline fields and lineage
    pub async fn get_execution(&self, id: &WorkflowExecutionId) -> Result<WorkflowExecution, CoreError> {
        validation::validate_workflow_execution_id(id)?;
        let mut execution = self.repositories.executions.get(id).await?;
        if let Some(source_id) = execution.source_execution_id {
            let source = self.repositories.executions.get_by_id(source_id).await?;
            execution.spec.metadata.reference_execution = Some(source.id);
        }
        if let Some(reference) = execution.inputs_uri.clone() {
            execution.closure.computed_inputs = Some(read_literal_map(self.store.as_ref(), &reference).await?);
        }
        if let Some(reference) = execution.user_inputs_uri.clone() {
            execution.spec.inputs = Some(read_literal_map(self.store.as_ref(), &reference).await?);
        }
        Ok(execution)
    }

    /// Data-access locations of an execution's inputs and outputs
    pub async fn get_execution_data(&self, id: &WorkflowExecutionId) -> Result<ExecutionData, CoreError> {
        validation::validate_workflow_execution_id(id)?;
        let execution = self.repositories.executions.get(id).await?;

        let outputs = match execution.closure.outputs_uri.as_deref() {
            Some(uri) if !uri.is_empty() => self.remote_url.get(uri).await?,
            _ => UrlBlob::default(),
        };
        let inputs_uri = match &execution.inputs_uri {
            Some(reference) if !reference.is_empty() => reference.clone(),
            _ => self.offload_legacy_inputs(execution).await?,
        };
        let inputs = self.remote_url.get(inputs_uri.as_str()).await?;
        Ok(ExecutionData { inputs, outputs })
    }

    /// Write the inline computed inputs of a legacy record to the store and
    /// remember the reference, so this happens once per record.
    async fn offload_legacy_inputs(
        &self,
        execution: WorkflowExecution,
    ) -> Result<admiral_content_store::DataReference, CoreError> {
        let computed = execution.closure.computed_inputs.clone().unwrap_or_default();
        let reference = offload_literal_map(
            self.store.as_ref(),
            &self.config.metadata_prefix,
            &execution.id,
            INPUTS_KEY,
            &computed,
        )
        .await?;
        debug!(execution_id = %execution.id, reference = %reference, "offloaded legacy inputs");

        let target = reference.clone();
        self.update_with_retry(execution, move |execution| {
            execution.inputs_uri = Some(target.clone());
        })
        .await?;
        Ok(reference)
    }

    /// Write a non-phase change, re-reading on concurrent phase updates
    async fn update_with_retry<F>(&self, mut execution: WorkflowExecution, mutate: F) -> Result<(), CoreError>
    where
        F: Fn(&mut WorkflowExecution) + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            mutate(&mut execution);
            match self.repositories.executions.update_execution(&execution).await {
                Ok(()) => return Ok(()),
                Err(CoreError::ConcurrentModification(_)) if attempt < MAX_UPDATE_ATTEMPTS => {
                    execution = self.repositories.executions.get(&execution.id).await?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// A page of executions in one project and domain
    pub async fn list_executions(&self, request: ResourceListRequest) -> Result<ExecutionList, CoreError> {
        validation::validate_resource_list_request(&request)?;

        let mut filters = vec![
            InlineFilter::eq("project", request.project.clone()),
            InlineFilter::eq("domain", request.domain.clone()),
        ];
        if let Some(name) = request.name.as_ref().filter(|name| !name.is_empty()) {
            filters.push(InlineFilter::eq("name", name.clone()));
        }
        filters.extend(list::parse_filters(&request.filters)?);
        list::validate_fields::<WorkflowExecution>(&filters, request.sort_by.as_ref())?;

        let offset = list::parse_token(&request.token)?;
        let input = ListResourceInput {
            limit: request.limit as usize,
            offset,
            filters,
            map_filters: Vec::new(),
            sort: request.sort_by,
        };
        let mut executions = self.repositories.executions.list(&input).await?;
        for execution in executions.iter_mut() {
            execution.spec.inputs = None;
            execution.closure.computed_inputs = None;
        }
        let token = list::next_token(offset, executions.len(), input.limit);
        Ok(ExecutionList { executions, token })
    }

    /// Abort an execution on its cluster, then record the cause
    pub async fn terminate_execution(&self, request: ExecutionTerminateRequest) -> Result<(), CoreError> {
        validation::validate_workflow_execution_id(&request.id)?;
        let execution = self.repositories.executions.get(&request.id).await.map_err(|err| {
            info!(execution_id = %request.id, error = %err, "failed to get execution to terminate");
            err
        })?;

        self.executor
            .terminate_workflow_execution(TerminateWorkflowInput {
                execution_id: request.id.clone(),
                cluster: execution.closure.cluster.clone(),
            })
            .await
            .map_err(|err| {
                info!(execution_id = %request.id, error = %err, "failed to terminate execution");
                err
            })?;

        // The abort is already in flight; a failure here leaves the cause unrecorded.
        let cause = request.cause.clone();
        self.update_with_retry(execution, move |execution| {
            execution.closure.abort_cause = Some(cause.clone());
        })
        .await?;
        info!(execution_id = %request.id, "terminated execution");
        Ok(())
    }
}

async fn observe_scheduled_delay(
    launch_plans: Arc<dyn LaunchPlanRepository>,
    store: Arc<dyn ContentStorage>,
    watches: Arc<ScopedStopWatches>,
    execution: WorkflowExecution,
    running_at: DateTime<Utc>,
) {
    let launch_plan = match launch_plans.get(&execution.spec.launch_plan).await {
        Ok(launch_plan) => launch_plan,
        Err(err) => {
            warn!(execution_id = %execution.id, error = %err, "failed to get launch plan for scheduled delay");
            return;
        }
    };
    let Some(argument) = launch_plan.kickoff_time_input_arg() else {
        debug!(execution_id = %execution.id, "launch plan schedule has no kickoff time input");
        return;
    };
    let Some(reference) = execution.inputs_uri.as_ref() else {
        warn!(execution_id = %execution.id, "scheduled execution has no offloaded inputs");
        return;
    };
    let inputs = match read_literal_map(store.as_ref(), reference).await {
        Ok(inputs) => inputs,
        Err(err) => {
            warn!(execution_id = %execution.id, error = %err, "failed to read inputs for scheduled delay");
            return;
        }
    };
    match inputs.get(argument).and_then(|literal| literal.as_datetime()) {
        Some(kickoff) => watches.observe(&execution.id.project, &execution.id.domain, kickoff, running_at),
        None => warn!(
            execution_id = %execution.id,
            argument,
            "kickoff time input missing or not a datetime"
        ),
    }
}
