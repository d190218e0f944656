//! Orchestrator error types.

use chatkeep_blobs::BlobError;
use chatkeep_cache::CacheError;
use chatkeep_records::RecordError;
use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Coarse error category, stable for transports to map onto their own codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    Dependency,
    TimedOut,
}

impl ErrorKind {
    /// Error code for programmatic handling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "invalid_input",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::PermissionDenied => "permission_denied",
            Self::Dependency => "dependency_error",
            Self::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chat service error type.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A backend failed for a reason the caller cannot fix.
    #[error("{backend} error: {source}")]
    Dependency {
        backend: &'static str,
        #[source]
        source: BoxError,
    },

    /// The operation was cancelled after waiting `after`.
    #[error("{operation} timed out after {after:?}")]
    TimedOut {
        operation: &'static str,
        after: Duration,
    },
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::Dependency { .. } => ErrorKind::Dependency,
            Self::TimedOut { .. } => ErrorKind::TimedOut,
        }
    }

    pub(crate) fn dependency(backend: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Dependency {
            backend,
            source: source.into(),
        }
    }
}

impl From<chatkeep_core::Error> for ChatError {
    fn from(err: chatkeep_core::Error) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<RecordError> for ChatError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::NotFound(what) => Self::NotFound(what),
            RecordError::AlreadyExists(what) => Self::AlreadyExists(what),
            RecordError::PermissionDenied(why) => Self::PermissionDenied(why),
            RecordError::EmptyUpdate | RecordError::InvalidRange { .. } => {
                Self::Validation(err.to_string())
            }
            other => Self::dependency("records", other),
        }
    }
}

impl From<CacheError> for ChatError {
    fn from(err: CacheError) -> Self {
        Self::dependency("cache", err)
    }
}

impl From<BlobError> for ChatError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound(key) => Self::NotFound(format!("avatar {key}")),
            BlobError::InvalidKey(_) => Self::Validation(err.to_string()),
            other => Self::dependency("blobs", other),
        }
    }
}

/// Result type for chat service operations.
pub type ChatResult<T> = std::result::Result<T, ChatError>;
