//! Core error types.

use thiserror::Error;

/// Error type returned by caller-supplied constraints and listeners.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which side of a transition a place belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    From,
    To,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::From => f.write_str("from"),
            Side::To => f.write_str("to"),
        }
    }
}

/// Errors from the workflow engine.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("place '{place}' in transition '{transition}' is not defined in workflow places")]
    InvalidSchema { place: String, transition: String },

    #[error("transition name cannot be empty")]
    EmptyName,

    #[error("transition '{transition}' must have at least one 'from' place")]
    EmptyFromSet { transition: String },

    #[error("transition '{transition}' must have at least one 'to' place")]
    EmptyToSet { transition: String },

    #[error("transition '{transition}' has duplicate '{side}' place: {place}")]
    DuplicatePlace {
        transition: String,
        side: Side,
        place: String,
    },

    #[error("invalid place: {place}")]
    InvalidPlace { place: String },

    #[error("invalid transition")]
    InvalidTransition,

    #[error("transition not allowed")]
    TransitionNotAllowed,

    #[error("constraint failed: {0}")]
    Constraint(#[source] BoxError),

    #[error("listener failed: {0}")]
    Listener(#[source] BoxError),

    #[error("initial place '{place}' is not defined in the workflow")]
    InvalidInitialPlace { place: String },

    #[error("invalid workflow: {reason}")]
    InvalidWorkflow { reason: String },

    #[error("place '{place}' is not marked")]
    PlaceNotMarked { place: String },

    #[error("workflow with name {name} already exists")]
    WorkflowExists { name: String },

    #[error("workflow {name} not found")]
    WorkflowNotFound { name: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Returns true for the rejections produced by the guard protocol.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CoreError::TransitionNotAllowed | CoreError::Constraint(_) | CoreError::Listener(_)
        )
    }

    /// Returns a stable error code for display and logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::InvalidSchema { .. } => "INVALID_SCHEMA",
            CoreError::EmptyName => "EMPTY_NAME",
            CoreError::EmptyFromSet { .. } => "EMPTY_FROM_SET",
            CoreError::EmptyToSet { .. } => "EMPTY_TO_SET",
            CoreError::DuplicatePlace { .. } => "DUPLICATE_PLACE",
            CoreError::InvalidPlace { .. } => "INVALID_PLACE",
            CoreError::InvalidTransition => "INVALID_TRANSITION",
            CoreError::TransitionNotAllowed => "TRANSITION_NOT_ALLOWED",
            CoreError::Constraint(_) => "CONSTRAINT_FAILED",
            CoreError::Listener(_) => "LISTENER_FAILED",
            CoreError::InvalidInitialPlace { .. } => "INVALID_PLACE",
            CoreError::InvalidWorkflow { .. } => "BAD_REQUEST",
            CoreError::PlaceNotMarked { .. } => "PLACE_NOT_MARKED",
            CoreError::WorkflowExists { .. } => "WORKFLOW_EXISTS",
            CoreError::WorkflowNotFound { .. } => "WORKFLOW_NOT_FOUND",
            CoreError::Json(_) => "BAD_REQUEST",
        }
    }
}
