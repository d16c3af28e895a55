/// Entity and execution identities
pub mod identifier;

/// Lifecycle phases and the transition rule
pub mod phase;

/// Typed input and output values
pub mod literal;

/// Notification settings and messages
pub mod notification;

/// Launch plans
pub mod launch_plan;

/// Compiled workflows and tasks
pub mod workflow;

/// Workflow executions and their events
pub mod execution;

/// Node and task executions and their events
pub mod node_execution;

/// Filters, sorting and pagination
pub mod list;

/// Repository interfaces
pub mod repository;

/// Workflow executor and publisher interfaces
pub mod ports;
