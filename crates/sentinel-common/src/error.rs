//! Error types shared by repository implementations

use thiserror::Error;

/// Store error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Entity not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Unique constraint violated
    #[error("conflict: {0}")]
    Conflict(String),

    /// Backend failure
    #[error("storage error: {0}")]
    Storage(String),
}

/// Store result type
pub type StoreResult<T> = Result<T, StoreError>;
