//! Request validation and input merging.

use crate::config::RegistrationConfig;
use crate::domain::execution::{ExecutionCreateRequest, ResourceListRequest, WorkflowExecutionEventRequest};
use crate::domain::identifier::{Identifier, NodeExecutionId, TaskExecutionId, WorkflowExecutionId};
use crate::domain::literal::{LiteralMap, ParameterMap};
use crate::domain::node_execution::{
    NodeExecutionEventRequest, NodeExecutionForTaskListRequest, NodeExecutionListRequest,
};
use crate::error::CoreError;
use std::collections::HashMap;

/// Longest accepted execution name
pub const MAX_EXECUTION_NAME_LENGTH: usize = 20;

fn missing(field: &str) -> CoreError {
    CoreError::ValidationError(format!("missing {}", field))
}

fn require(value: &str, field: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(missing(field));
    }
    Ok(())
}

/// Lowercase DNS-1123 label of at most [`MAX_EXECUTION_NAME_LENGTH`] characters
pub fn validate_execution_name(name: &str) -> Result<(), CoreError> {
    if name.len() > MAX_EXECUTION_NAME_LENGTH {
        return Err(CoreError::ValidationError(format!(
            "name [{}] exceeds {} characters",
            name, MAX_EXECUTION_NAME_LENGTH
        )));
    }
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let valid_edges = !name.starts_with('-') && !name.ends_with('-');
    if name.is_empty() || !valid_chars || !valid_edges {
        return Err(CoreError::ValidationError(format!(
            "name [{}] must be a lowercase alphanumeric label, '-' allowed inside",
            name
        )));
    }
    Ok(())
}

/// Project, domain, name and version must all be set
pub fn validate_identifier(id: &Identifier, what: &str) -> Result<(), CoreError> {
    require(&id.project, &format!("{} project", what))?;
    require(&id.domain, &format!("{} domain", what))?;
    require(&id.name, &format!("{} name", what))?;
    require(&id.version, &format!("{} version", what))
}

/// Project, domain and name must all be set
pub fn validate_workflow_execution_id(id: &WorkflowExecutionId) -> Result<(), CoreError> {
    require(&id.project, "project")?;
    require(&id.domain, "domain")?;
    require(&id.name, "name")
}

/// Execution identity plus node id
pub fn validate_node_execution_id(id: &NodeExecutionId) -> Result<(), CoreError> {
    require(&id.node_id, "node_id")?;
    validate_workflow_execution_id(&id.execution_id)
}

/// Task identity plus its node
pub fn validate_task_execution_id(id: &TaskExecutionId) -> Result<(), CoreError> {
    validate_identifier(&id.task_id, "task")?;
    validate_node_execution_id(&id.node_execution_id)
}

/// Cap on the number of map entries; 0 disables the cap
pub fn validate_map_size(max_entries: usize, map: Option<&HashMap<String, String>>, field: &str) -> Result<(), CoreError> {
    let len = map.map_or(0, HashMap::len);
    if max_entries > 0 && len > max_entries {
        return Err(CoreError::ValidationError(format!(
            "{} has too many entries [{} > {}]",
            field, len, max_entries
        )));
    }
    Ok(())
}

/// Shape checks on a create request
pub fn validate_execution_request(request: &ExecutionCreateRequest, registration: &RegistrationConfig) -> Result<(), CoreError> {
    require(&request.project, "project")?;
    require(&request.domain, "domain")?;
    if !request.name.is_empty() {
        validate_execution_name(&request.name)?;
    }
    validate_identifier(&request.spec.launch_plan, "launch_plan")?;
    validate_map_size(registration.max_label_entries, request.spec.labels.as_ref(), "labels")?;
    validate_map_size(
        registration.max_annotation_entries,
        request.spec.annotations.as_ref(),
        "annotations",
    )
}

/// Merge user inputs with the launch plan's fixed and default inputs.
///
/// Unknown inputs, overrides of fixed inputs and missing required inputs are
/// rejected. Fixed inputs always win.
pub fn check_and_fetch_inputs(
    user_inputs: &LiteralMap,
    fixed_inputs: &LiteralMap,
    expected_inputs: &ParameterMap,
) -> Result<LiteralMap, CoreError> {
    for name in user_inputs.literals.keys() {
        if fixed_inputs.contains(name) {
            return Err(CoreError::ValidationError(format!(
                "{} is a fixed input and cannot be overridden",
                name
            )));
        }
        if !expected_inputs.parameters.contains_key(name) {
            return Err(CoreError::ValidationError(format!("invalid input {}", name)));
        }
    }

    let mut resolved = LiteralMap::new();
    for (name, parameter) in &expected_inputs.parameters {
        if let Some(value) = user_inputs.get(name) {
            resolved.insert(name.clone(), value.clone());
        } else if let Some(default) = &parameter.default {
            resolved.insert(name.clone(), default.clone());
        } else if parameter.required && !fixed_inputs.contains(name) {
            return Err(CoreError::ValidationError(format!("missing required input {}", name)));
        }
    }
    for (name, value) in &fixed_inputs.literals {
        resolved.insert(name.clone(), value.clone());
    }
    Ok(resolved)
}

/// Shape checks on an execution event
pub fn validate_workflow_event_request(request: &WorkflowExecutionEventRequest) -> Result<(), CoreError> {
    require(&request.request_id, "request_id")?;
    validate_workflow_execution_id(&request.event.execution_id)?;
    if request.event.occurred_at.is_none() {
        return Err(missing("occurred_at"));
    }
    Ok(())
}

/// Shape checks on a node event
pub fn validate_node_event_request(request: &NodeExecutionEventRequest) -> Result<(), CoreError> {
    require(&request.request_id, "request_id")?;
    validate_node_execution_id(&request.event.id)?;
    if request.event.occurred_at.is_none() {
        return Err(missing("occurred_at"));
    }
    Ok(())
}

fn validate_limit(limit: u32) -> Result<(), CoreError> {
    if limit == 0 {
        return Err(CoreError::ValidationError("limit must be greater than 0".to_string()));
    }
    Ok(())
}

/// Shape checks on a list request
pub fn validate_resource_list_request(request: &ResourceListRequest) -> Result<(), CoreError> {
    require(&request.project, "project")?;
    require(&request.domain, "domain")?;
    validate_limit(request.limit)
}

/// Shape checks on a node list request
pub fn validate_node_list_request(request: &NodeExecutionListRequest) -> Result<(), CoreError> {
    validate_workflow_execution_id(&request.workflow_execution_id)?;
    validate_limit(request.limit)
}

/// Shape checks on a node-for-task list request
pub fn validate_node_for_task_list_request(request: &NodeExecutionForTaskListRequest) -> Result<(), CoreError> {
    validate_task_execution_id(&request.task_execution_id)?;
    validate_limit(request.limit)
}
