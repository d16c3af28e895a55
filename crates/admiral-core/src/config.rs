//! Application configuration consumed by the managers, and the queue rules
//! consumed by the allocator.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Limits applied to registration-time maps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Maximum number of labels on an execution; 0 means unlimited
    #[serde(default = "default_max_entries")]
    pub max_label_entries: usize,
    /// Maximum number of annotations on an execution; 0 means unlimited
    #[serde(default = "default_max_entries")]
    pub max_annotation_entries: usize,
}

fn default_max_entries() -> usize {
    0
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            max_label_entries: default_max_entries(),
            max_annotation_entries: default_max_entries(),
        }
    }
}

/// Quantity strings per resource; empty means unset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResourceSet {
    /// CPU, e.g. `500m`
    #[serde(default)]
    pub cpu: String,
    /// Memory, e.g. `1Gi`
    #[serde(default)]
    pub memory: String,
    /// GPU count
    #[serde(default)]
    pub gpu: String,
    /// Ephemeral storage
    #[serde(default)]
    pub storage: String,
}

/// Platform defaults and ceilings for task resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResourceConfig {
    /// Requests applied to containers that do not set their own
    #[serde(default = "default_task_resource_defaults")]
    pub defaults: TaskResourceSet,
    /// Upper bounds for requests
    #[serde(default = "default_task_resource_limits")]
    pub limits: TaskResourceSet,
}

fn default_task_resource_defaults() -> TaskResourceSet {
    TaskResourceSet {
        cpu: "2".to_string(),
        memory: "200Mi".to_string(),
        gpu: String::new(),
        storage: String::new(),
    }
}

fn default_task_resource_limits() -> TaskResourceSet {
    TaskResourceSet {
        cpu: "2".to_string(),
        memory: "1Gi".to_string(),
        gpu: "1".to_string(),
        storage: "20Mi".to_string(),
    }
}

impl Default for TaskResourceConfig {
    fn default() -> Self {
        Self {
            defaults: default_task_resource_defaults(),
            limits: default_task_resource_limits(),
        }
    }
}

/// Email rendering settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Sender address
    #[serde(default = "default_sender")]
    pub sender: String,
    /// Subject template
    #[serde(default = "default_subject_template")]
    pub subject_template: String,
    /// Body template
    #[serde(default = "default_body_template")]
    pub body_template: String,
}

fn default_sender() -> String {
    "admiral-notifications@example.com".to_string()
}

fn default_subject_template() -> String {
    "Notice: Execution \"{{ name }}\" has {{ phase }} in \"{{ domain }}\".".to_string()
}

fn default_body_template() -> String {
    "Execution \"{{ name }}\" has {{ phase }} in \"{{ domain }}\" of project \"{{ project }}\".{{ error }}"
        .to_string()
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            sender: default_sender(),
            subject_template: default_subject_template(),
            body_template: default_body_template(),
        }
    }
}

/// Configuration of the lifecycle managers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Label and annotation caps
    #[serde(default)]
    pub registration: RegistrationConfig,
    /// Resource defaults and limits
    #[serde(default)]
    pub task_resources: TaskResourceConfig,
    /// Email rendering
    #[serde(default)]
    pub notifications: NotificationsConfig,
    /// First segment of offloaded payload references
    #[serde(default = "default_metadata_prefix")]
    pub metadata_prefix: String,
    /// Concurrent background tasks; extra tasks are dropped
    #[serde(default = "default_background_workers")]
    pub background_workers: usize,
}

fn default_metadata_prefix() -> String {
    "metadata".to_string()
}

fn default_background_workers() -> usize {
    16
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            registration: RegistrationConfig::default(),
            task_resources: TaskResourceConfig::default(),
            notifications: NotificationsConfig::default(),
            metadata_prefix: default_metadata_prefix(),
            background_workers: default_background_workers(),
        }
    }
}

/// An execution queue pair selected by tag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionQueue {
    /// Queue for the primary workflow
    #[serde(default)]
    pub primary: String,
    /// Queue for dynamically generated children
    #[serde(default)]
    pub dynamic: String,
    /// Tags routed to this queue
    #[serde(default)]
    pub attributes: Vec<String>,
}

/// A rule routing one workflow (or a wildcard set) to tagged queues
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowConfig {
    /// Project; empty matches any
    #[serde(default)]
    pub project: String,
    /// Domain; empty matches any
    #[serde(default)]
    pub domain: String,
    /// Workflow name; empty matches any
    #[serde(default)]
    pub workflow_name: String,
    /// Tags of the queues to use; empty matches any task
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Ordered queue routing rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueConfig {
    /// Attribute rules, in priority order
    #[serde(default)]
    pub execution_queues: Vec<ExecutionQueue>,
    /// Workflow rules, in priority order
    #[serde(default)]
    pub workflow_configs: Vec<WorkflowConfig>,
}

/// Source of the current queue rules
pub trait QueueConfigProvider: Send + Sync {
    /// Immutable snapshot to use for one allocation decision
    fn snapshot(&self) -> Arc<QueueConfig>;
}

/// Queue rules that never change
#[derive(Debug, Clone, Default)]
pub struct StaticQueueConfig {
    config: Arc<QueueConfig>,
}

impl StaticQueueConfig {
    /// Wrap a fixed configuration
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl QueueConfigProvider for StaticQueueConfig {
    fn snapshot(&self) -> Arc<QueueConfig> {
        self.config.clone()
    }
}
