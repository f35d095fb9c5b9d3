//! Storage error types.

use thiserror::Error;

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("workflow state not found: {0}")]
    StateNotFound(String),

    #[error("no places to save for workflow {0}")]
    EmptyMarking(String),

    #[error("invalid workflow id: {0}")]
    InvalidId(String),

    #[error("data corruption: {0}")]
    Corruption(String),

    #[error("core error: {0}")]
    Core(#[from] placenet_core::CoreError),
}

impl StorageError {
    /// Returns true if the engine rejected a transition.
    pub fn is_rejection(&self) -> bool {
        matches!(self, StorageError::Core(e) if e.is_rejection())
    }

    /// Returns a stable error code for display and logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            StorageError::Io(_) => "IO_ERROR",
            StorageError::Json(_) => "BAD_REQUEST",
            StorageError::StateNotFound(_) => "STATE_NOT_FOUND",
            StorageError::EmptyMarking(_) => "EMPTY_MARKING",
            StorageError::InvalidId(_) => "BAD_REQUEST",
            StorageError::Corruption(_) => "CORRUPTION",
            StorageError::Core(e) => e.error_code(),
        }
    }
}
