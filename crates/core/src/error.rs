//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
///
/// These are input errors detected before any backend is contacted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("chat name must not be empty")]
    EmptyName,

    #[error("message body must not be empty")]
    EmptyBody,

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("nothing to update: name, description and avatar are all unset")]
    NothingToUpdate,
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
