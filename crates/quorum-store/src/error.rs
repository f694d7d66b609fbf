//! Store error types.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the storage traits.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A credential with the same provider subject already exists for a
    /// different user.
    #[error("provider subject already linked to another account")]
    DuplicateSubject,

    /// The addressed row does not exist.
    #[error("not found")]
    NotFound,

    /// The backend failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}
