use admiral_content_store::ContentStoreError;
use std::fmt;
use thiserror::Error;

/// Client-facing classification of a [`CoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request was malformed or violated a limit
    InvalidArgument,
    /// A referenced entity does not exist
    NotFound,
    /// The entity or event was already recorded
    AlreadyExists,
    /// The request conflicts with the current state of the entity
    FailedPrecondition,
    /// Anything else
    Internal,
}

impl ErrorKind {
    /// Whether a caller may reasonably retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Internal)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::AlreadyExists => "AlreadyExists",
            ErrorKind::FailedPrecondition => "FailedPrecondition",
            ErrorKind::Internal => "Internal",
        };
        f.write_str(name)
    }
}

/// Core error type for the Admiral control plane
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Pagination token could not be parsed
    #[error("Invalid pagination token: {0}")]
    InvalidPaginationToken(String),

    /// Filter expression could not be parsed or references an unknown field
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Entity or event already recorded
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The entity is terminal and cannot move to another phase
    #[error("{message}")]
    AlreadyInTerminalState {
        /// Human readable description of the rejected change
        message: String,
        /// Phase the entity is stuck in
        current_phase: String,
    },

    /// A concurrent writer changed the entity between read and write
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    /// The request is valid but the current state does not allow it
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Content store error
    #[error("Content store error: {0}")]
    ContentStoreError(String),

    /// State store error
    #[error("State store error: {0}")]
    StateStoreError(String),

    /// A notification setting carries no usable channel
    #[error("Unrecognized notification type: {0}")]
    UnrecognizedNotificationType(String),

    /// The workflow executor rejected or failed a request
    #[error("Workflow executor error: {0}")]
    WorkflowExecutorError(String),

    /// Generic internal error
    #[error("{0}")]
    Internal(String),
}

impl CoreError {
    /// Classify the error for clients
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ValidationError(_)
            | CoreError::InvalidPaginationToken(_)
            | CoreError::InvalidFilter(_) => ErrorKind::InvalidArgument,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            CoreError::AlreadyInTerminalState { .. }
            | CoreError::ConcurrentModification(_)
            | CoreError::FailedPrecondition(_) => ErrorKind::FailedPrecondition,
            CoreError::SerializationError(_)
            | CoreError::ContentStoreError(_)
            | CoreError::StateStoreError(_)
            | CoreError::UnrecognizedNotificationType(_)
            | CoreError::WorkflowExecutorError(_)
            | CoreError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Phase reported by an [`CoreError::AlreadyInTerminalState`] error
    pub fn current_phase(&self) -> Option<&str> {
        match self {
            CoreError::AlreadyInTerminalState { current_phase, .. } => Some(current_phase),
            _ => None,
        }
    }

    /// Same kind, new message
    pub fn with_message(self, message: impl Into<String>) -> Self {
        let message = message.into();
        match self {
            CoreError::ValidationError(_) => CoreError::ValidationError(message),
            CoreError::InvalidPaginationToken(_) => CoreError::InvalidPaginationToken(message),
            CoreError::InvalidFilter(_) => CoreError::InvalidFilter(message),
            CoreError::NotFound(_) => CoreError::NotFound(message),
            CoreError::AlreadyExists(_) => CoreError::AlreadyExists(message),
            CoreError::AlreadyInTerminalState { current_phase, .. } => {
                CoreError::AlreadyInTerminalState { message, current_phase }
            }
            CoreError::ConcurrentModification(_) => CoreError::ConcurrentModification(message),
            CoreError::FailedPrecondition(_) => CoreError::FailedPrecondition(message),
            CoreError::SerializationError(_) => CoreError::SerializationError(message),
            CoreError::ContentStoreError(_) => CoreError::ContentStoreError(message),
            CoreError::StateStoreError(_) => CoreError::StateStoreError(message),
            CoreError::UnrecognizedNotificationType(_) => CoreError::UnrecognizedNotificationType(message),
            CoreError::WorkflowExecutorError(_) => CoreError::WorkflowExecutorError(message),
            CoreError::Internal(_) => CoreError::Internal(message),
        }
    }
}

impl From<ContentStoreError> for CoreError {
    fn from(err: ContentStoreError) -> Self {
        CoreError::ContentStoreError(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admiral_content_store::DataReference;

    #[test]
    fn test_error_display() {
        let errors = vec![
            (CoreError::ValidationError("missing project".to_string()), "Validation error: missing project"),
            (CoreError::InvalidPaginationToken("abc".to_string()), "Invalid pagination token: abc"),
            (CoreError::InvalidFilter("eq(x".to_string()), "Invalid filter: eq(x"),
            (CoreError::NotFound("p/d/n".to_string()), "Not found: p/d/n"),
            (CoreError::AlreadyExists("p/d/n".to_string()), "Already exists: p/d/n"),
            (
                CoreError::AlreadyInTerminalState {
                    message: "execution is terminal".to_string(),
                    current_phase: "SUCCEEDED".to_string(),
                },
                "execution is terminal",
            ),
            (CoreError::ConcurrentModification("p/d/n".to_string()), "Concurrent modification: p/d/n"),
            (CoreError::FailedPrecondition("child".to_string()), "Failed precondition: child"),
            (CoreError::SerializationError("eof".to_string()), "Serialization error: eof"),
            (CoreError::ContentStoreError("io".to_string()), "Content store error: io"),
            (CoreError::StateStoreError("lock".to_string()), "State store error: lock"),
            (CoreError::UnrecognizedNotificationType("none".to_string()), "Unrecognized notification type: none"),
            (CoreError::WorkflowExecutorError("down".to_string()), "Workflow executor error: down"),
            (CoreError::Internal("boom".to_string()), "boom"),
        ];

        for (error, expected_msg) in errors {
            assert_eq!(error.to_string(), expected_msg);
        }
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(CoreError::ValidationError(String::new()).kind(), ErrorKind::InvalidArgument);
        assert_eq!(CoreError::InvalidFilter(String::new()).kind(), ErrorKind::InvalidArgument);
        assert_eq!(CoreError::NotFound(String::new()).kind(), ErrorKind::NotFound);
        assert_eq!(CoreError::AlreadyExists(String::new()).kind(), ErrorKind::AlreadyExists);
        assert_eq!(
            CoreError::ConcurrentModification(String::new()).kind(),
            ErrorKind::FailedPrecondition
        );
        assert_eq!(
            CoreError::UnrecognizedNotificationType(String::new()).kind(),
            ErrorKind::Internal
        );
        assert!(ErrorKind::Internal.is_retryable());
        assert!(!ErrorKind::InvalidArgument.is_retryable());
    }

    #[test]
    fn test_terminal_state_carries_phase() {
        let error = CoreError::AlreadyInTerminalState {
            message: "no".to_string(),
            current_phase: "ABORTED".to_string(),
        };
        assert_eq!(error.kind(), ErrorKind::FailedPrecondition);
        assert_eq!(error.current_phase(), Some("ABORTED"));
        assert_eq!(CoreError::Internal("x".to_string()).current_phase(), None);
    }

    #[test]
    fn test_with_message_keeps_kind() {
        let error = CoreError::NotFound("p/d/n".to_string()).with_message("failed to get existing execution id: [p/d/n]");
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(error.to_string(), "Not found: failed to get existing execution id: [p/d/n]");
    }

    #[test]
    fn test_from_content_store_error() {
        let error: CoreError = ContentStoreError::NotFound(DataReference::new("mem://x")).into();
        match error {
            CoreError::ContentStoreError(msg) => assert!(msg.contains("mem://x")),
            other => panic!("Expected ContentStoreError variant, got {:?}", other),
        }
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error: CoreError = json_error.into();
        assert!(matches!(error, CoreError::SerializationError(msg) if msg.contains("expected value")));
    }
}
