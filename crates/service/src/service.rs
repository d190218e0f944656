//! The chat orchestrator.
//!
//! [`ChatService`] coordinates three backends with different guarantees:
//! - the record store is authoritative and every mutation lands there first
//! - the cache is a derived view, written through on mutation and populated
//!   on read misses; its failures are logged and never fail a call
//! - the avatar store issues time-limited URLs that are refreshed whenever a
//!   read would otherwise surface an expired one
//!
//! Nothing here retries or locks. Concurrent writers to the same chat race,
//! and the last cache write wins until the TTL evicts it.

use crate::error::{ChatError, ChatResult};
use bytes::Bytes;
use chatkeep_blobs::AvatarStore;
use chatkeep_cache::CacheStore;
use chatkeep_core::model::validate_chat_name;
use chatkeep_core::{
    Avatar, ChatInfoUpdate, ChatPreview, ChatRecord, ChatSnapshot, DEFAULT_WINDOW_CAPACITY,
    Message, PresignedUrl,
};
use chatkeep_records::{ChatUpdate, RecordError, RecordStore};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::oneshot;
use tracing::instrument;
use uuid::Uuid;

const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(5);

/// Chat metadata and history service.
#[derive(Clone)]
pub struct ChatService {
    records: Arc<dyn RecordStore>,
    cache: Arc<dyn CacheStore>,
    avatars: AvatarStore,
    delete_timeout: Duration,
    window_capacity: usize,
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("avatars", &self.avatars)
            .field("delete_timeout", &self.delete_timeout)
            .field("window_capacity", &self.window_capacity)
            .finish_non_exhaustive()
    }
}

/// Combined backend health, one entry per backend.
#[derive(Debug)]
pub struct HealthReport {
    pub records: ChatResult<()>,
    pub cache: ChatResult<()>,
    pub avatars: ChatResult<()>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.records.is_ok() && self.cache.is_ok() && self.avatars.is_ok()
    }
}

impl ChatService {
    pub fn new(
        records: Arc<dyn RecordStore>,
        cache: Arc<dyn CacheStore>,
        avatars: AvatarStore,
    ) -> Self {
        Self {
            records,
            cache,
            avatars,
            delete_timeout: DEFAULT_DELETE_TIMEOUT,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
        }
    }

    /// Upper bound on how long [`ChatService::delete_chat`] waits for the
    /// durable delete.
    pub fn with_delete_timeout(mut self, timeout: Duration) -> Self {
        self.delete_timeout = timeout;
        self
    }

    /// Number of messages rebuilt into the window after a cache miss. Should
    /// match the cache's own capacity.
    pub fn with_window_capacity(mut self, capacity: usize) -> Self {
        self.window_capacity = capacity;
        self
    }

    /// Create a chat owned by `owner_id` and return its id.
    ///
    /// The owner is the only participant. Without an avatar the chat points
    /// at the shared default image.
    #[instrument(skip(self, description, avatar), fields(has_avatar = avatar.is_some()))]
    pub async fn create_chat(
        &self,
        name: &str,
        description: &str,
        avatar: Option<Bytes>,
        owner_id: &str,
    ) -> ChatResult<Uuid> {
        validate_chat_name(name)?;
        require("owner id", owner_id)?;

        let chat_id = Uuid::new_v4();
        let avatar = avatar.map(|data| Avatar::new(chat_id.to_string(), data));
        let link = self.avatars.save_avatar(avatar.as_ref()).await?;

        let record = ChatRecord::new(chat_id, name, description, owner_id, link.key, link.url);
        self.records.save_chat(&record).await?;

        self.cache_chat(&record.snapshot()).await;
        if let Err(e) = self.cache.save_messages(chat_id, &[]).await {
            tracing::warn!(chat_id = %chat_id, error = %e, "Failed to seed message window");
        }

        tracing::info!(chat_id = %chat_id, owner_id = %owner_id, "Chat created");
        Ok(chat_id)
    }

    /// Read a chat, cache first.
    ///
    /// An expired image URL is replaced before returning. On a cache hit the
    /// refreshed URL is persisted to the record store only, so the cached
    /// copy keeps the stale URL until it is next rewritten or evicted.
    #[instrument(skip(self))]
    pub async fn get_chat(&self, chat_id: Uuid) -> ChatResult<ChatSnapshot> {
        match self.cache.get_chat(chat_id).await {
            Ok(mut snapshot) => {
                if snapshot.image_expired(OffsetDateTime::now_utc()) {
                    let image = self.refresh_image(chat_id, &snapshot.avatar_key).await?;
                    snapshot.set_image(image);
                }
                return Ok(snapshot);
            }
            Err(e) if e.is_miss() => tracing::debug!(chat_id = %chat_id, "Chat cache miss"),
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "Cache read failed, using records")
            }
        }

        let mut snapshot = self.records.get_chat(chat_id).await?.snapshot();
        if snapshot.image_expired(OffsetDateTime::now_utc()) {
            let image = self.refresh_image(chat_id, &snapshot.avatar_key).await?;
            snapshot.set_image(image);
        }
        self.cache_chat(&snapshot).await;
        Ok(snapshot)
    }

    /// Add `participant_id` to a chat owned by `requester_id`.
    ///
    /// Repeated calls add the participant repeatedly.
    #[instrument(skip(self))]
    pub async fn add_participant(
        &self,
        requester_id: &str,
        chat_id: Uuid,
        participant_id: &str,
    ) -> ChatResult<()> {
        require("participant id", participant_id)?;

        self.records
            .add_participant(requester_id, chat_id, participant_id)
            .await?;

        if let Err(e) = self.cache.add_participant(chat_id, participant_id).await {
            tracing::warn!(chat_id = %chat_id, error = %e, "Failed to add participant to cache");
        }
        Ok(())
    }

    /// Change a chat's name, description or avatar and return the result.
    ///
    /// Blank text fields are left unchanged. A new avatar replaces the old
    /// object by delete-then-recreate, which is not atomic: if the upload
    /// fails after the delete the chat has no image object until the next
    /// successful update. The upload also lands before the record UPDATE;
    /// if that UPDATE fails, a chat still on the default image keeps
    /// pointing at the default and the uploaded `chat_id` object is left
    /// orphaned.
    #[instrument(skip(self, update), fields(has_avatar = update.avatar.is_some()))]
    pub async fn update_chat_info(
        &self,
        requester_id: &str,
        chat_id: Uuid,
        update: ChatInfoUpdate,
    ) -> ChatResult<ChatSnapshot> {
        update.validate()?;

        let mut columns = ChatUpdate::new();
        if let Some(name) = update.name() {
            columns = columns.name(name);
        }
        if let Some(description) = update.description() {
            columns = columns.description(description);
        }
        if let Some(data) = update.avatar {
            // The upload happens before the owner-scoped UPDATE can reject it.
            let current = self.records.get_chat(chat_id).await?;
            if current.owner_id != requester_id {
                return Err(ChatError::PermissionDenied(format!(
                    "user {requester_id} does not own chat {chat_id}"
                )));
            }
            let link = self
                .avatars
                .update_avatar(&Avatar::new(chat_id.to_string(), data))
                .await?;
            columns = columns.image(link.key, &link.url);
        }

        let record = self
            .records
            .update_chat_info(requester_id, chat_id, &columns)
            .await?;
        let snapshot = record.snapshot();
        self.cache_chat(&snapshot).await;

        tracing::info!(chat_id = %chat_id, columns = columns.assignments().len(), "Chat updated");
        Ok(snapshot)
    }

    /// Delete a chat owned by `requester_id`.
    ///
    /// The durable delete runs on its own task while the cache entry is
    /// dropped on this one. Once the delete commits the cache entry is
    /// dropped again, since a read racing the delete can repopulate it from
    /// the not yet deleted row. If the durable delete does not report back
    /// within the configured timeout it is aborted and [`ChatError::TimedOut`]
    /// is returned; whether it committed is then unknown.
    #[instrument(skip(self))]
    pub async fn delete_chat(&self, requester_id: &str, chat_id: Uuid) -> ChatResult<()> {
        let (done_tx, done_rx) = oneshot::channel();
        let records = self.records.clone();
        let owner_id = requester_id.to_string();
        let task = tokio::spawn(async move {
            let result = records.delete_chat(&owner_id, chat_id).await;
            // The receiver is gone only if the caller already timed out.
            let _ = done_tx.send(result);
        });

        if let Err(e) = self.cache.delete_chat(chat_id).await {
            tracing::warn!(chat_id = %chat_id, error = %e, "Failed to delete chat from cache");
        }

        match tokio::time::timeout(self.delete_timeout, done_rx).await {
            Ok(Ok(result)) => {
                result?;
                if let Err(e) = self.cache.delete_chat(chat_id).await {
                    tracing::warn!(
                        chat_id = %chat_id,
                        error = %e,
                        "Failed to evict chat from cache after delete"
                    );
                }
                tracing::info!(chat_id = %chat_id, "Chat deleted");
                Ok(())
            }
            Ok(Err(_)) => {
                let source: Box<dyn std::error::Error + Send + Sync> = match task.await {
                    Err(join_err) => Box::new(join_err),
                    Ok(()) => "delete task exited without reporting".into(),
                };
                Err(ChatError::Dependency {
                    backend: "records",
                    source,
                })
            }
            Err(_) => {
                task.abort();
                tracing::warn!(
                    chat_id = %chat_id,
                    timeout_ms = self.delete_timeout.as_millis() as u64,
                    "Chat delete timed out, task aborted"
                );
                Err(ChatError::TimedOut {
                    operation: "delete_chat",
                    after: self.delete_timeout,
                })
            }
        }
    }

    /// Previews of every chat `user_id` participates in. A user with no
    /// chats gets an empty list.
    #[instrument(skip(self))]
    pub async fn list_user_chats(&self, user_id: &str) -> ChatResult<Vec<ChatPreview>> {
        let mut previews = match self.records.get_user_chats(user_id).await {
            Ok(previews) => previews,
            Err(RecordError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let now = OffsetDateTime::now_utc();
        for preview in &mut previews {
            if preview.image_expired(now) {
                let image = self.refresh_image(preview.id, &preview.avatar_key).await?;
                preview.set_image(image);
            }
        }
        Ok(previews)
    }

    /// Append a message to a chat's log and to its cached window.
    #[instrument(skip(self, body))]
    pub async fn send_message(
        &self,
        chat_id: Uuid,
        sender_id: &str,
        body: &str,
    ) -> ChatResult<Message> {
        let message = Message::new(sender_id, body)?;
        self.records.append_message(chat_id, &message).await?;

        // The cache only extends a window that is already populated; a
        // missing one is rebuilt from the log on the next read.
        match self.cache.push_message(chat_id, &message).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(chat_id = %chat_id, "No message window to extend"),
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "Failed to push message to window")
            }
        }
        Ok(message)
    }

    /// The most recent messages of a chat, oldest first.
    ///
    /// Served from the window cache; on a miss the tail of the durable log
    /// is read and written back as the new window.
    #[instrument(skip(self))]
    pub async fn recent_messages(&self, chat_id: Uuid) -> ChatResult<Vec<Message>> {
        match self.cache.get_messages(chat_id).await {
            Ok(messages) => return Ok(messages),
            Err(e) if e.is_miss() => tracing::debug!(chat_id = %chat_id, "Message window miss"),
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "Window read failed, using records")
            }
        }

        let count = self.records.message_count(chat_id).await?;
        let from = count.saturating_sub(self.window_capacity);
        let messages = self.records.get_messages(chat_id, from, count).await?;

        if let Err(e) = self.cache.save_messages(chat_id, &messages).await {
            tracing::warn!(chat_id = %chat_id, error = %e, "Failed to repopulate message window");
        }
        Ok(messages)
    }

    /// Probe every backend.
    pub async fn health_check(&self) -> HealthReport {
        let (records, cache, avatars) = tokio::join!(
            self.records.health_check(),
            self.cache.health_check(),
            self.avatars.health_check(),
        );
        HealthReport {
            records: records.map_err(ChatError::from),
            cache: cache.map_err(ChatError::from),
            avatars: avatars.map_err(ChatError::from),
        }
    }

    /// Issue a fresh URL for `avatar_key` and record it durably. Failing to
    /// record it is logged; the fresh URL is still returned.
    async fn refresh_image(&self, chat_id: Uuid, avatar_key: &str) -> ChatResult<PresignedUrl> {
        let image = self.avatars.get_url(avatar_key).await?;
        if let Err(e) = self.records.update_image_url(chat_id, &image).await {
            tracing::warn!(chat_id = %chat_id, error = %e, "Failed to persist refreshed image URL");
        } else {
            tracing::debug!(chat_id = %chat_id, "Refreshed expired image URL");
        }
        Ok(image)
    }

    async fn cache_chat(&self, snapshot: &ChatSnapshot) {
        if let Err(e) = self.cache.save_chat(snapshot).await {
            tracing::warn!(chat_id = %snapshot.id, error = %e, "Failed to cache chat");
        }
    }
}

fn require(field: &'static str, value: &str) -> ChatResult<()> {
    if value.trim().is_empty() {
        return Err(chatkeep_core::Error::EmptyField(field).into());
    }
    Ok(())
}
