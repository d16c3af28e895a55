use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of registered entity an [`Identifier`] points at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Not set
    #[default]
    Unspecified,
    /// A task definition
    Task,
    /// A workflow definition
    Workflow,
    /// A launch plan
    LaunchPlan,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceType::Unspecified => "unspecified",
            ResourceType::Task => "task",
            ResourceType::Workflow => "workflow",
            ResourceType::LaunchPlan => "launch_plan",
        };
        f.write_str(name)
    }
}

/// Versioned identity of a registered entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    /// Entity kind
    pub resource_type: ResourceType,
    /// Owning project
    pub project: String,
    /// Domain within the project
    pub domain: String,
    /// Entity name
    pub name: String,
    /// Registered version
    pub version: String,
}

impl Identifier {
    /// Create a new identifier
    pub fn new(
        resource_type: ResourceType,
        project: impl Into<String>,
        domain: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            resource_type,
            project: project.into(),
            domain: domain.into(),
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}/{}@{}",
            self.resource_type, self.project, self.domain, self.name, self.version
        )
    }
}

/// Identity of one workflow execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowExecutionId {
    /// Owning project
    pub project: String,
    /// Domain within the project
    pub domain: String,
    /// Execution name, unique within project and domain
    pub name: String,
}

impl WorkflowExecutionId {
    /// Create a new execution id
    pub fn new(project: impl Into<String>, domain: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            domain: domain.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkflowExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.project, self.domain, self.name)
    }
}

/// Identity of a node inside a workflow execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeExecutionId {
    /// Execution the node belongs to
    pub execution_id: WorkflowExecutionId,
    /// Node id from the workflow graph
    pub node_id: String,
}

impl NodeExecutionId {
    /// Create a new node execution id
    pub fn new(execution_id: WorkflowExecutionId, node_id: impl Into<String>) -> Self {
        Self {
            execution_id,
            node_id: node_id.into(),
        }
    }
}

impl fmt::Display for NodeExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.execution_id, self.node_id)
    }
}

/// Identity of one attempt of a task run by a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskExecutionId {
    /// Task that ran
    pub task_id: Identifier,
    /// Node that ran it
    pub node_execution_id: NodeExecutionId,
    /// Zero based attempt number
    pub retry_attempt: u32,
}

impl fmt::Display for TaskExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} task={} attempt={}",
            self.node_execution_id, self.task_id, self.retry_attempt
        )
    }
}
