//! Record store error types.

use thiserror::Error;

/// Record store operation errors.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The row exists but the requester does not own it.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid message range: {from}..{to}")]
    InvalidRange { from: usize, to: usize },

    #[error("chat update sets no columns")]
    EmptyUpdate,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    /// A stored value could not be mapped back to the domain model.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RecordError {
    /// Map an INSERT failure, turning unique-constraint violations into
    /// [`RecordError::AlreadyExists`].
    pub(crate) fn from_insert(err: sqlx::Error, what: impl FnOnce() -> String) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return RecordError::AlreadyExists(what());
        }
        RecordError::Database(err)
    }
}

/// Result type for record store operations.
pub type RecordResult<T> = std::result::Result<T, RecordError>;
