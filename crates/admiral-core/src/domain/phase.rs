//! Execution and node phases, and the single transition rule shared by both.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Common behaviour of lifecycle phases
pub trait Phase: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Whether no further phase change is accepted after this one
    fn is_terminal(&self) -> bool;
}

/// Lifecycle phase of a workflow execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowExecutionPhase {
    /// Recorded but not yet reported on by the engine
    #[default]
    Undefined,
    /// Waiting for resources
    Queued,
    /// Running
    Running,
    /// Finishing successfully
    Succeeding,
    /// Finished successfully
    Succeeded,
    /// Finishing with a failure
    Failing,
    /// Finished with a failure
    Failed,
    /// Terminated on request
    Aborted,
    /// Exceeded its deadline
    TimedOut,
}

impl WorkflowExecutionPhase {
    /// Every phase in declaration order
    pub const ALL: [WorkflowExecutionPhase; 9] = [
        WorkflowExecutionPhase::Undefined,
        WorkflowExecutionPhase::Queued,
        WorkflowExecutionPhase::Running,
        WorkflowExecutionPhase::Succeeding,
        WorkflowExecutionPhase::Succeeded,
        WorkflowExecutionPhase::Failing,
        WorkflowExecutionPhase::Failed,
        WorkflowExecutionPhase::Aborted,
        WorkflowExecutionPhase::TimedOut,
    ];

    /// Upper-case name used in filters, logs and notifications
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowExecutionPhase::Undefined => "UNDEFINED",
            WorkflowExecutionPhase::Queued => "QUEUED",
            WorkflowExecutionPhase::Running => "RUNNING",
            WorkflowExecutionPhase::Succeeding => "SUCCEEDING",
            WorkflowExecutionPhase::Succeeded => "SUCCEEDED",
            WorkflowExecutionPhase::Failing => "FAILING",
            WorkflowExecutionPhase::Failed => "FAILED",
            WorkflowExecutionPhase::Aborted => "ABORTED",
            WorkflowExecutionPhase::TimedOut => "TIMED_OUT",
        }
    }
}

impl Phase for WorkflowExecutionPhase {
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowExecutionPhase::Succeeded
                | WorkflowExecutionPhase::Failed
                | WorkflowExecutionPhase::Aborted
                | WorkflowExecutionPhase::TimedOut
        )
    }
}

impl fmt::Display for WorkflowExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle phase of a node execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeExecutionPhase {
    /// Not reported yet
    #[default]
    Undefined,
    /// Waiting for resources
    Queued,
    /// Running
    Running,
    /// Finished successfully
    Succeeded,
    /// Finishing with a failure
    Failing,
    /// Finished with a failure
    Failed,
    /// Terminated on request
    Aborted,
    /// Not run because of an upstream decision
    Skipped,
    /// Exceeded its deadline
    TimedOut,
}

impl NodeExecutionPhase {
    /// Upper-case name used in filters and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeExecutionPhase::Undefined => "UNDEFINED",
            NodeExecutionPhase::Queued => "QUEUED",
            NodeExecutionPhase::Running => "RUNNING",
            NodeExecutionPhase::Succeeded => "SUCCEEDED",
            NodeExecutionPhase::Failing => "FAILING",
            NodeExecutionPhase::Failed => "FAILED",
            NodeExecutionPhase::Aborted => "ABORTED",
            NodeExecutionPhase::Skipped => "SKIPPED",
            NodeExecutionPhase::TimedOut => "TIMED_OUT",
        }
    }
}

impl Phase for NodeExecutionPhase {
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            NodeExecutionPhase::Succeeded
                | NodeExecutionPhase::Failed
                | NodeExecutionPhase::Aborted
                | NodeExecutionPhase::Skipped
                | NodeExecutionPhase::TimedOut
        )
    }
}

impl fmt::Display for NodeExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle phase of a task attempt, as recorded by the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskExecutionPhase {
    /// Not reported yet
    #[default]
    Undefined,
    /// Waiting for resources
    Queued,
    /// Running
    Running,
    /// Finished successfully
    Succeeded,
    /// Terminated on request
    Aborted,
    /// Finished with a failure
    Failed,
}

impl Phase for TaskExecutionPhase {
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskExecutionPhase::Succeeded | TaskExecutionPhase::Aborted | TaskExecutionPhase::Failed
        )
    }
}

impl fmt::Display for TaskExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskExecutionPhase::Undefined => "UNDEFINED",
            TaskExecutionPhase::Queued => "QUEUED",
            TaskExecutionPhase::Running => "RUNNING",
            TaskExecutionPhase::Succeeded => "SUCCEEDED",
            TaskExecutionPhase::Aborted => "ABORTED",
            TaskExecutionPhase::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Why a reported phase was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRejection<P: Phase> {
    /// The reported phase equals the recorded one
    Duplicate {
        /// The repeated phase
        phase: P,
    },
    /// The recorded phase is terminal
    AlreadyTerminal {
        /// Recorded phase
        current: P,
        /// Phase the event tried to move to
        reported: P,
    },
}

impl<P: Phase> TransitionRejection<P> {
    /// Convert into the error returned to callers
    pub fn into_error(self, target: &dyn fmt::Display) -> CoreError {
        match self {
            TransitionRejection::Duplicate { phase } => {
                CoreError::AlreadyExists(format!("{} is already in phase {}", target, phase))
            }
            TransitionRejection::AlreadyTerminal { current, reported } => CoreError::AlreadyInTerminalState {
                message: format!(
                    "invalid phase change from {} to {} for {}",
                    current, reported, target
                ),
                current_phase: current.to_string(),
            },
        }
    }
}

/// Check a reported phase against the recorded one.
///
/// A repeat of the recorded phase is a duplicate even when that phase is
/// terminal; any other change away from a terminal phase is rejected.
pub fn validate_transition<P: Phase>(current: P, reported: P) -> Result<(), TransitionRejection<P>> {
    if current == reported {
        return Err(TransitionRejection::Duplicate { phase: current });
    }
    if current.is_terminal() {
        return Err(TransitionRejection::AlreadyTerminal { current, reported });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_terminal_workflow_phases() {
        let terminal: Vec<_> = WorkflowExecutionPhase::ALL
            .iter()
            .filter(|p| p.is_terminal())
            .map(|p| p.as_str())
            .collect();
        assert_eq!(terminal, vec!["SUCCEEDED", "FAILED", "ABORTED", "TIMED_OUT"]);
    }

    #[test]
    fn test_skipped_node_is_terminal() {
        assert!(NodeExecutionPhase::Skipped.is_terminal());
        assert!(!NodeExecutionPhase::Failing.is_terminal());
    }

    #[test]
    fn test_forward_transition_accepted() {
        assert!(validate_transition(WorkflowExecutionPhase::Undefined, WorkflowExecutionPhase::Running).is_ok());
        // Phases may move "backwards" while not terminal.
        assert!(validate_transition(NodeExecutionPhase::Running, NodeExecutionPhase::Queued).is_ok());
    }

    #[test]
    fn test_duplicate_checked_before_terminal() {
        let rejection =
            validate_transition(WorkflowExecutionPhase::Succeeded, WorkflowExecutionPhase::Succeeded).unwrap_err();
        assert_eq!(
            rejection,
            TransitionRejection::Duplicate {
                phase: WorkflowExecutionPhase::Succeeded
            }
        );
        assert_eq!(rejection.into_error(&"p/d/n").kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_terminal_rejects_change() {
        let rejection =
            validate_transition(WorkflowExecutionPhase::Aborted, WorkflowExecutionPhase::Running).unwrap_err();
        let error = rejection.into_error(&"p/d/n");
        assert_eq!(error.kind(), ErrorKind::FailedPrecondition);
        assert_eq!(error.current_phase(), Some("ABORTED"));
        assert!(error.to_string().contains("ABORTED to RUNNING"));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&WorkflowExecutionPhase::TimedOut).unwrap();
        assert_eq!(json, "\"TIMED_OUT\"");
    }
}
