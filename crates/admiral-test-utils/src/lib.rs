//! Testing utilities for the Admiral control plane.
//!
//! This crate provides fixture builders, `mockall` mocks of the outbound
//! collaborators, recording fakes, and a harness that wires both lifecycle
//! managers over the in-memory stack.

pub mod builders;
pub mod harness;
pub mod implementations;
pub mod mocks;

/// Re-export commonly used types for convenience
pub use mockall;

pub use harness::TestHarness;
pub use implementations::{RecordingEmailer, RecordingPublisher, RecordingSubscriber, RecordingWorkflowExecutor};
pub use mocks::{MockEmailer, MockPublisher, MockWorkflowExecutor};

/// Install a test subscriber honouring `RUST_LOG`; repeated calls are no-ops
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
