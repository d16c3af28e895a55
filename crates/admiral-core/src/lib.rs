//!
//! Admiral Core - execution lifecycle for the Admiral control plane
//!
//! This crate owns the domain model of workflow and node executions, the
//! phase state machine shared by both, and the managers that validate,
//! dispatch, record and read back executions. Persistence, content storage,
//! dispatch and notification delivery are reached through traits.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - executions, phases, filters and collaborator interfaces
pub mod domain;

/// Application services - the lifecycle managers and their helpers
pub mod application;

/// Application configuration
pub mod config;

/// Error types
pub mod error;

// Re-export key types
pub use error::{CoreError, ErrorKind};

pub use application::background::BackgroundPool;
pub use application::execution_manager::ExecutionManager;
pub use application::node_execution_manager::{NodeEventOutcome, NodeExecutionManager};
pub use application::queue_allocator::QueueAllocator;
pub use config::{ApplicationConfig, QueueConfig, QueueConfigProvider, StaticQueueConfig};

pub use domain::identifier::{Identifier, NodeExecutionId, ResourceType, TaskExecutionId, WorkflowExecutionId};
pub use domain::phase::{NodeExecutionPhase, Phase, TaskExecutionPhase, WorkflowExecutionPhase};
pub use domain::ports::{Publisher, WorkflowExecutor};
pub use domain::repository::{
    ExecutionRepository, LaunchPlanRepository, NodeExecutionRepository, Repositories, TaskExecutionRepository,
    WorkflowRepository,
};
