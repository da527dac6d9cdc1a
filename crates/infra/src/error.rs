//! Storage boundary error model.

use thiserror::Error;

use stockroom_orders::SequenceError;

/// Failure reported by a storage backend.
///
/// These are infrastructure errors as opposed to domain errors: the backend
/// never decides business rules, it only reports what the storage layer
/// refused or could not do.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Underlying persistence failure (connection, query, lock poisoning).
    #[error("storage failure: {0}")]
    Storage(String),

    /// The code series is corrupt (non-numeric code) or exhausted.
    #[error("sequence failure: {0}")]
    Sequence(#[from] SequenceError),

    /// A uniqueness constraint was violated (e.g. duplicate code).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A referenced row does not exist.
    #[error("{0} not found")]
    NotFound(String),
}

impl StoreError {
    pub(crate) fn poisoned() -> Self {
        StoreError::Storage("lock poisoned".to_string())
    }
}
