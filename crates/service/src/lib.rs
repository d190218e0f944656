//! Chat orchestration for chatkeep.
//!
//! This crate ties the backends together:
//! - [`ChatService`], the cache-aside orchestrator
//! - [`ChatError`], the error taxonomy exposed to transports
//! - Bootstrap helpers for configuration, tracing and backend construction

pub mod bootstrap;
pub mod error;
pub mod service;

pub use error::{ChatError, ChatResult, ErrorKind};
pub use service::{ChatService, HealthReport};
