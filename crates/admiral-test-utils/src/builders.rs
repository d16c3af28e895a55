//! Fixture builders for launch plans, workflows, requests and events.

use admiral_core::domain::execution::{
    EventOutput, ExecutionCreateRequest, ExecutionError, WorkflowExecutionEvent, WorkflowExecutionEventRequest,
};
use admiral_core::domain::identifier::{
    Identifier, NodeExecutionId, ResourceType, TaskExecutionId, WorkflowExecutionId,
};
use admiral_core::domain::launch_plan::{LaunchPlan, Schedule};
use admiral_core::domain::literal::{Literal, LiteralMap, Parameter};
use admiral_core::domain::node_execution::{NodeExecutionEvent, NodeExecutionEventRequest, ParentTaskMetadata};
use admiral_core::domain::notification::NotificationSetting;
use admiral_core::domain::phase::{NodeExecutionPhase, WorkflowExecutionPhase};
use admiral_core::domain::workflow::{CompiledTask, CompiledWorkflowClosure, Container, TaskTarget, TaskTemplate, Workflow};
use chrono::Utc;
use std::collections::HashMap;

/// Project used by the fixtures
pub const PROJECT: &str = "project";
/// Domain used by the fixtures
pub const DOMAIN: &str = "development";

/// Launch plan identity in the fixture project
pub fn launch_plan_id(name: &str) -> Identifier {
    Identifier::new(ResourceType::LaunchPlan, PROJECT, DOMAIN, name, "v1")
}

/// Workflow identity in the fixture project
pub fn workflow_id(name: &str) -> Identifier {
    Identifier::new(ResourceType::Workflow, PROJECT, DOMAIN, name, "v1")
}

/// Execution identity in the fixture project
pub fn execution_id(name: &str) -> WorkflowExecutionId {
    WorkflowExecutionId::new(PROJECT, DOMAIN, name)
}

/// Node identity inside a fixture execution
pub fn node_id(execution: &str, node: &str) -> NodeExecutionId {
    NodeExecutionId::new(execution_id(execution), node)
}

/// Task attempt identity for a node of a fixture execution
pub fn task_execution_id(execution: &str, node: &str, task: &str) -> TaskExecutionId {
    TaskExecutionId {
        task_id: Identifier::new(ResourceType::Task, PROJECT, DOMAIN, task, "v1"),
        node_execution_id: node_id(execution, node),
        retry_attempt: 0,
    }
}

/// Container task carrying routing tags
pub fn container_task(name: &str, tags: &[&str]) -> CompiledTask {
    CompiledTask {
        template: TaskTemplate {
            id: Identifier::new(ResourceType::Task, PROJECT, DOMAIN, name, "v1"),
            task_type: "python-task".to_string(),
            resource_tags: tags.iter().map(|tag| tag.to_string()).collect(),
            target: Some(TaskTarget::Container(Container {
                image: "image:latest".to_string(),
                ..Default::default()
            })),
        },
    }
}

/// Builder for a workflow
#[derive(Debug, Clone)]
pub struct WorkflowBuilder {
    workflow: Workflow,
}

impl WorkflowBuilder {
    /// Workflow with one node and no tasks
    pub fn new(name: &str) -> Self {
        Self {
            workflow: Workflow {
                internal_id: 1,
                id: workflow_id(name),
                closure: CompiledWorkflowClosure {
                    node_ids: vec!["n0".to_string()],
                    tasks: Vec::new(),
                },
            },
        }
    }

    /// Add a task
    pub fn task(mut self, task: CompiledTask) -> Self {
        self.workflow.closure.tasks.push(task);
        self
    }

    /// Finish
    pub fn build(self) -> Workflow {
        self.workflow
    }
}

/// Builder for a launch plan
#[derive(Debug, Clone)]
pub struct LaunchPlanBuilder {
    launch_plan: LaunchPlan,
}

impl LaunchPlanBuilder {
    /// Launch plan running `workflow`, with no inputs
    pub fn new(name: &str, workflow: &Identifier) -> Self {
        let mut launch_plan = LaunchPlan {
            internal_id: 1,
            id: launch_plan_id(name),
            ..Default::default()
        };
        launch_plan.spec.workflow_id = workflow.clone();
        Self { launch_plan }
    }

    /// Input the caller must provide
    pub fn required_input(mut self, name: &str) -> Self {
        self.launch_plan
            .closure
            .expected_inputs
            .parameters
            .insert(name.to_string(), Parameter::required());
        self
    }

    /// Input with a default value
    pub fn default_input(mut self, name: &str, value: Literal) -> Self {
        self.launch_plan
            .closure
            .expected_inputs
            .parameters
            .insert(name.to_string(), Parameter::with_default(value));
        self
    }

    /// Input the caller may not override
    pub fn fixed_input(mut self, name: &str, value: Literal) -> Self {
        self.launch_plan.spec.fixed_inputs.insert(name, value);
        self
    }

    /// Notification inherited by executions
    pub fn notification(mut self, setting: NotificationSetting) -> Self {
        self.launch_plan.spec.entity_metadata.notifications.push(setting);
        self
    }

    /// Schedule whose kickoff time lands in `kickoff_arg`
    pub fn schedule(mut self, kickoff_arg: &str) -> Self {
        self.launch_plan.spec.entity_metadata.schedule = Some(Schedule {
            cron_expression: "0 * * * *".to_string(),
            kickoff_time_input_arg: kickoff_arg.to_string(),
        });
        self
    }

    /// Labels inherited by executions
    pub fn labels(mut self, labels: &[(&str, &str)]) -> Self {
        self.launch_plan.spec.labels = Some(to_map(labels));
        self
    }

    /// Finish
    pub fn build(self) -> LaunchPlan {
        self.launch_plan
    }
}

/// Owned map from string pairs
pub fn to_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Create request for a launch plan in the fixture project
pub fn create_request(name: &str, launch_plan: &Identifier, inputs: LiteralMap) -> ExecutionCreateRequest {
    let mut request = ExecutionCreateRequest {
        project: PROJECT.to_string(),
        domain: DOMAIN.to_string(),
        name: name.to_string(),
        inputs: Some(inputs),
        ..Default::default()
    };
    request.spec.launch_plan = launch_plan.clone();
    request
}

/// Execution event occurring now
pub fn execution_event(
    id: &WorkflowExecutionId,
    request_id: &str,
    phase: WorkflowExecutionPhase,
) -> WorkflowExecutionEventRequest {
    WorkflowExecutionEventRequest {
        request_id: request_id.to_string(),
        event: WorkflowExecutionEvent {
            execution_id: id.clone(),
            producer_id: String::new(),
            phase,
            occurred_at: Some(Utc::now()),
            output: None,
        },
    }
}

/// Failed execution event carrying an error message
pub fn failed_event(id: &WorkflowExecutionId, request_id: &str, message: &str) -> WorkflowExecutionEventRequest {
    let mut request = execution_event(id, request_id, WorkflowExecutionPhase::Failed);
    request.event.output = Some(EventOutput::Error(ExecutionError {
        code: "USER:Failure".to_string(),
        message: message.to_string(),
        error_uri: None,
    }));
    request
}

/// Node event occurring now
pub fn node_event(id: &NodeExecutionId, request_id: &str, phase: NodeExecutionPhase) -> NodeExecutionEventRequest {
    NodeExecutionEventRequest {
        request_id: request_id.to_string(),
        event: NodeExecutionEvent {
            id: id.clone(),
            producer_id: "cluster-1".to_string(),
            phase,
            occurred_at: Some(Utc::now()),
            input_uri: format!("mem://admiral/{}/inputs.pb", id),
            ..Default::default()
        },
    }
}

/// Node event for a node produced by a dynamic task
pub fn child_node_event(
    id: &NodeExecutionId,
    request_id: &str,
    phase: NodeExecutionPhase,
    parent: &TaskExecutionId,
) -> NodeExecutionEventRequest {
    let mut request = node_event(id, request_id, phase);
    request.event.parent_task_metadata = Some(ParentTaskMetadata { id: parent.clone() });
    request
}
