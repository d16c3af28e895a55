use crate::domain::identifier::Identifier;
use serde::{Deserialize, Serialize};

/// A key/value entry of container configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    /// Key
    pub key: String,
    /// Value
    pub value: String,
}

impl KeyValuePair {
    /// Create a pair
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Compute resource a container can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceName {
    /// CPU cores
    Cpu,
    /// Memory
    Memory,
    /// GPU devices
    Gpu,
    /// Ephemeral storage
    Storage,
}

impl ResourceName {
    /// Every resource name
    pub const ALL: [ResourceName; 4] = [
        ResourceName::Cpu,
        ResourceName::Memory,
        ResourceName::Gpu,
        ResourceName::Storage,
    ];
}

/// Amount of one resource, as a quantity string such as `500m` or `2Gi`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    /// Resource
    pub name: ResourceName,
    /// Quantity
    pub value: String,
}

/// Requests and limits of a container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    /// Guaranteed amounts
    #[serde(default)]
    pub requests: Vec<ResourceEntry>,
    /// Maximum amounts
    #[serde(default)]
    pub limits: Vec<ResourceEntry>,
}

fn find(entries: &[ResourceEntry], name: ResourceName) -> Option<&str> {
    entries
        .iter()
        .find(|entry| entry.name == name)
        .map(|entry| entry.value.as_str())
}

impl Resources {
    /// Requested quantity of a resource
    pub fn request(&self, name: ResourceName) -> Option<&str> {
        find(&self.requests, name)
    }

    /// Limit of a resource
    pub fn limit(&self, name: ResourceName) -> Option<&str> {
        find(&self.limits, name)
    }
}

/// Container that runs a task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// Image reference
    pub image: String,
    /// Command line arguments
    #[serde(default)]
    pub args: Vec<String>,
    /// Requests and limits
    #[serde(default)]
    pub resources: Resources,
    /// Extra configuration read by the engine, e.g. queue names
    #[serde(default)]
    pub config: Vec<KeyValuePair>,
}

impl Container {
    /// First configuration value for a key
    pub fn config_value(&self, key: &str) -> Option<&str> {
        self.config
            .iter()
            .find(|pair| pair.key == key)
            .map(|pair| pair.value.as_str())
    }
}

/// What a task runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskTarget {
    /// A container image
    Container(Container),
    /// A query run by a plugin
    Sql {
        /// Query text
        statement: String,
    },
}

/// Compiled task definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTemplate {
    /// Registered identity
    pub id: Identifier,
    /// Plugin type, e.g. `python-task`
    #[serde(default)]
    pub task_type: String,
    /// Tags used to route the task to an execution queue
    #[serde(default)]
    pub resource_tags: Vec<String>,
    /// What the task runs
    #[serde(default)]
    pub target: Option<TaskTarget>,
}

impl TaskTemplate {
    /// The container target, if the task runs one
    pub fn container(&self) -> Option<&Container> {
        match &self.target {
            Some(TaskTarget::Container(container)) => Some(container),
            _ => None,
        }
    }

    /// Mutable access to the container target
    pub fn container_mut(&mut self) -> Option<&mut Container> {
        match &mut self.target {
            Some(TaskTarget::Container(container)) => Some(container),
            _ => None,
        }
    }
}

/// Task as embedded in a compiled workflow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledTask {
    /// Task definition
    pub template: TaskTemplate,
}

/// Compiled workflow, ready to hand to the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledWorkflowClosure {
    /// Node ids of the primary workflow graph
    #[serde(default)]
    pub node_ids: Vec<String>,
    /// Tasks referenced by the graph
    #[serde(default)]
    pub tasks: Vec<CompiledTask>,
}

/// A registered workflow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    /// Storage-assigned id
    pub internal_id: u64,
    /// Registered identity
    pub id: Identifier,
    /// Compiled form
    pub closure: CompiledWorkflowClosure,
}
