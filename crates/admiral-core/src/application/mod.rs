/// Workflow execution lifecycle
pub mod execution_manager;

/// Node execution lifecycle
pub mod node_execution_manager;

/// Queue selection for container tasks
pub mod queue_allocator;

/// Notification normalization and rendering
pub mod notifications;

/// Request validation and input merging
pub mod validation;

/// Task resource defaults and limits
pub mod resources;

/// Offloaded inputs
pub mod inputs;

/// Bounded pool for detached side effects
pub mod background;

/// Metric names and recording helpers
pub mod metrics;
