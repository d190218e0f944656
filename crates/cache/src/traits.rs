//! Cache store trait.

use crate::error::CacheResult;
use async_trait::async_trait;
use chatkeep_core::{ChatSnapshot, Message};
use uuid::Uuid;

/// Chat snapshot and recent-message window cache.
///
/// The cache is advisory: every key carries a TTL and callers must tolerate
/// any key being absent. Writes spanning several keys are not atomic.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Store the scalar record and participant list, both with a fresh TTL.
    async fn save_chat(&self, snapshot: &ChatSnapshot) -> CacheResult<()>;

    /// Read a snapshot and slide its TTL.
    ///
    /// Absence and undecodable data both surface as [`CacheError::Miss`].
    /// A missing participant list reads as empty.
    ///
    /// [`CacheError::Miss`]: crate::CacheError::Miss
    async fn get_chat(&self, chat_id: Uuid) -> CacheResult<ChatSnapshot>;

    /// Append to a cached participant list. If the list is not cached the
    /// snapshot is invalidated instead, so the next read repopulates it.
    async fn add_participant(&self, chat_id: Uuid, participant_id: &str) -> CacheResult<()>;

    /// Remove every key belonging to the chat.
    async fn delete_chat(&self, chat_id: Uuid) -> CacheResult<()>;

    /// Append one message to a populated window, evicting the oldest when
    /// full. Returns `false` without writing when the window is absent, so a
    /// window never starts from a single message with its history missing.
    async fn push_message(&self, chat_id: Uuid, message: &Message) -> CacheResult<bool>;

    /// Replace the window with the tail of `messages` (oldest first).
    async fn save_messages(&self, chat_id: Uuid, messages: &[Message]) -> CacheResult<()>;

    /// Window contents, oldest first. A window that was never populated is
    /// a miss; an empty one is `Ok(vec![])`.
    async fn get_messages(&self, chat_id: Uuid) -> CacheResult<Vec<Message>>;

    /// Check connectivity.
    async fn health_check(&self) -> CacheResult<()>;
}
