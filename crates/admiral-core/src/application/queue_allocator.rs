//! Routes container tasks to execution queues.
//!
//! Rules are evaluated in configured order and the first match wins.

use crate::config::{QueueConfig, QueueConfigProvider, WorkflowConfig};
use crate::domain::identifier::Identifier;
use crate::domain::workflow::{CompiledWorkflowClosure, KeyValuePair};
use std::sync::Arc;
use tracing::debug;

/// Container config key holding the primary queue
pub const PARENT_QUEUE_KEY: &str = "parent_queue";
/// Container config key holding the dynamic queue
pub const CHILD_QUEUE_KEY: &str = "child_queue";

/// Queues selected for one task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueAssignment {
    /// Queue for the primary workflow
    pub primary: String,
    /// Queue for dynamically generated children
    pub dynamic: String,
}

fn field_matches(rule: &str, actual: &str) -> bool {
    rule.is_empty() || rule == actual
}

fn rule_matches(rule: &WorkflowConfig, workflow: &Identifier) -> bool {
    field_matches(&rule.project, &workflow.project)
        && field_matches(&rule.domain, &workflow.domain)
        && field_matches(&rule.workflow_name, &workflow.name)
}

fn intersects(a: &[String], b: &[String]) -> bool {
    a.iter().any(|tag| b.contains(tag))
}

fn queue_for_tags(config: &QueueConfig, tags: &[String]) -> Option<QueueAssignment> {
    config
        .execution_queues
        .iter()
        .find(|queue| intersects(&queue.attributes, tags))
        .map(|queue| QueueAssignment {
            primary: queue.primary.clone(),
            dynamic: queue.dynamic.clone(),
        })
}

/// Pick the queues for a task of `workflow` carrying `tags`.
///
/// Workflow rules are tried first; when none yields a queue the task tags are
/// matched against the attribute rules directly.
pub fn allocate(config: &QueueConfig, workflow: &Identifier, tags: &[String]) -> Option<QueueAssignment> {
    let from_workflow_rule = config
        .workflow_configs
        .iter()
        .filter(|rule| rule_matches(rule, workflow))
        .find(|rule| rule.tags.is_empty() || intersects(&rule.tags, tags))
        .and_then(|rule| {
            let selector: &[String] = if rule.tags.is_empty() { tags } else { &rule.tags };
            queue_for_tags(config, selector)
        });

    from_workflow_rule.or_else(|| queue_for_tags(config, tags))
}

/// Applies [`allocate`] to every container task of a compiled workflow
#[derive(Clone)]
pub struct QueueAllocator {
    provider: Arc<dyn QueueConfigProvider>,
}

impl QueueAllocator {
    /// Create an allocator reading rules from `provider`
    pub fn new(provider: Arc<dyn QueueConfigProvider>) -> Self {
        Self { provider }
    }

    /// Current rules
    pub fn snapshot(&self) -> Arc<QueueConfig> {
        self.provider.snapshot()
    }

    /// Write queue assignments into container configs. Returns the number of tasks annotated.
    pub fn annotate(&self, workflow: &Identifier, closure: &mut CompiledWorkflowClosure) -> usize {
        let config = self.snapshot();
        let mut annotated = 0;
        for task in closure.tasks.iter_mut() {
            let tags = task.template.resource_tags.clone();
            let task_name = task.template.id.name.clone();
            let Some(container) = task.template.container_mut() else {
                continue;
            };
            let Some(assignment) = allocate(&config, workflow, &tags) else {
                continue;
            };
            debug!(
                workflow = %workflow,
                task = %task_name,
                primary = %assignment.primary,
                dynamic = %assignment.dynamic,
                "assigned execution queues"
            );
            if !assignment.primary.is_empty() {
                container.config.push(KeyValuePair::new(PARENT_QUEUE_KEY, assignment.primary));
            }
            if !assignment.dynamic.is_empty() {
                container.config.push(KeyValuePair::new(CHILD_QUEUE_KEY, assignment.dynamic));
            }
            annotated += 1;
        }
        annotated
    }
}
