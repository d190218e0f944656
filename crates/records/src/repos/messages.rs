//! Message log repository trait.

use crate::error::RecordResult;
use async_trait::async_trait;
use chatkeep_core::Message;
use uuid::Uuid;

/// Repository for the per-chat append-only message log.
#[async_trait]
pub trait MessageRepo: Send + Sync {
    /// Insert the message row and append its id to the chat's message list
    /// as one transaction.
    async fn append_message(&self, chat_id: Uuid, message: &Message) -> RecordResult<()>;

    /// Messages at list positions `from..to` (zero-based, end exclusive),
    /// ordered by creation time. Positions past the end are ignored.
    async fn get_messages(&self, chat_id: Uuid, from: usize, to: usize)
    -> RecordResult<Vec<Message>>;

    /// Length of the chat's message list.
    async fn message_count(&self, chat_id: Uuid) -> RecordResult<usize>;
}
