//! Chat repository trait.

use crate::error::RecordResult;
use crate::update::ChatUpdate;
use async_trait::async_trait;
use chatkeep_core::{ChatPreview, ChatRecord, PresignedUrl};
use uuid::Uuid;

/// Repository for chat rows.
///
/// Mutations that act on behalf of a user are scoped by chat id AND owner id.
/// A scoped mutation that matches no row reports [`RecordError::NotFound`] when
/// the chat does not exist and [`RecordError::PermissionDenied`] when it exists
/// under another owner.
///
/// [`RecordError::NotFound`]: crate::RecordError::NotFound
/// [`RecordError::PermissionDenied`]: crate::RecordError::PermissionDenied
#[async_trait]
pub trait ChatRepo: Send + Sync {
    /// Insert a new chat. A duplicate id yields `AlreadyExists`.
    async fn save_chat(&self, chat: &ChatRecord) -> RecordResult<()>;

    /// Point lookup. Zero rows yields `NotFound`.
    async fn get_chat(&self, chat_id: Uuid) -> RecordResult<ChatRecord>;

    /// Apply a partial update owned by `owner_id` and return the post-update row.
    async fn update_chat_info(
        &self,
        owner_id: &str,
        chat_id: Uuid,
        update: &ChatUpdate,
    ) -> RecordResult<ChatRecord>;

    /// Persist a refreshed image URL. Not owner-scoped.
    async fn update_image_url(&self, chat_id: Uuid, image: &PresignedUrl) -> RecordResult<()>;

    /// Append `participant_id` to the chat's participant list.
    ///
    /// No de-duplication: repeated calls append repeatedly.
    async fn add_participant(
        &self,
        owner_id: &str,
        chat_id: Uuid,
        participant_id: &str,
    ) -> RecordResult<()>;

    /// Delete a chat and, by cascade, its messages.
    async fn delete_chat(&self, owner_id: &str, chat_id: Uuid) -> RecordResult<()>;

    /// Previews of every chat listing `user_id` as a participant, ordered by
    /// name. An empty result yields `NotFound`.
    async fn get_user_chats(&self, user_id: &str) -> RecordResult<Vec<ChatPreview>>;
}
