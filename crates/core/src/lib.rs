//! Core domain types and shared logic for chatkeep.
//!
//! This crate defines the data model used across the backend adapters and
//! the orchestrator:
//! - Chat records (system of record) and their cached snapshots
//! - Messages and the recent-message window
//! - Avatars and presigned URLs
//! - Application configuration

pub mod config;
pub mod error;
pub mod model;

pub use error::{Error, Result};
pub use model::{
    Avatar, ChatInfoUpdate, ChatPreview, ChatRecord, ChatSnapshot, Message, PresignedUrl,
};

/// Default number of messages kept in the per-chat recent-message window.
pub const DEFAULT_WINDOW_CAPACITY: usize = 10;

/// Blob key of the avatar shown for chats without an uploaded image.
pub const DEFAULT_AVATAR_KEY: &str = "avatar.png";

/// Content type used for every uploaded avatar.
pub const AVATAR_CONTENT_TYPE: &str = "image/png";
