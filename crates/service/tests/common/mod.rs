//! Service test harness and failure-injecting backend wrappers.

#![allow(dead_code)]

use async_trait::async_trait;
use chatkeep_blobs::{AvatarStore, MemoryBackend};
use chatkeep_cache::{CacheError, CacheResult, CacheStore, MemoryCache};
use chatkeep_core::config::BlobsConfig;
use chatkeep_core::{
    ChatPreview, ChatRecord, ChatSnapshot, DEFAULT_AVATAR_KEY, DEFAULT_WINDOW_CAPACITY, Message,
    PresignedUrl,
};
use chatkeep_records::{
    ChatRepo, ChatUpdate, MessageRepo, RecordError, RecordResult, RecordStore, SqliteStore,
};
use chatkeep_service::ChatService;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use time::OffsetDateTime;
use uuid::Uuid;

pub const TTL: Duration = Duration::from_secs(60);
pub const WINDOW: usize = DEFAULT_WINDOW_CAPACITY;

/// A service over a temp-file SQLite database, an in-process cache and an
/// in-process blob store, with every backend reachable for assertions.
pub struct TestService {
    pub service: ChatService,
    pub records: Arc<dyn RecordStore>,
    pub cache: Arc<FlakyCache>,
    pub blobs: Arc<MemoryBackend>,
    _temp_dir: TempDir,
}

impl TestService {
    pub async fn new() -> Self {
        Self::with_records(|records| records).await
    }

    /// Build the harness with the record store wrapped by `wrap`.
    pub async fn with_records<F>(wrap: F) -> Self
    where
        F: FnOnce(Arc<dyn RecordStore>) -> Arc<dyn RecordStore>,
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let sqlite = SqliteStore::new(temp_dir.path().join("records.db"), 5)
            .await
            .expect("Failed to open SQLite store");
        let records = wrap(Arc::new(sqlite));

        let cache = Arc::new(FlakyCache::new());
        let blobs = Arc::new(MemoryBackend::new("memory://avatars"));
        let avatars = AvatarStore::new(blobs.clone(), &BlobsConfig::default());

        let service = ChatService::new(records.clone(), cache.clone(), avatars)
            .with_window_capacity(WINDOW);

        Self {
            service,
            records,
            cache,
            blobs,
            _temp_dir: temp_dir,
        }
    }

    /// Write a chat straight into the record store, bypassing the service,
    /// with its image URL expiring at `expire_at`.
    pub async fn plant_chat(&self, owner: &str, expire_at: OffsetDateTime) -> ChatRecord {
        let record = ChatRecord::new(
            Uuid::new_v4(),
            "planted",
            "desc",
            owner,
            DEFAULT_AVATAR_KEY,
            PresignedUrl {
                url: "memory://avatars/avatar.png?expires=0".to_string(),
                expire_at,
            },
        );
        self.records
            .save_chat(&record)
            .await
            .expect("Failed to plant chat");
        record
    }
}

/// Whole-second timestamp `offset` from now.
pub fn at(offset: time::Duration) -> OffsetDateTime {
    (OffsetDateTime::now_utc() + offset)
        .replace_nanosecond(0)
        .expect("zero is a valid nanosecond")
}

pub fn ids(messages: &[Message]) -> Vec<Uuid> {
    messages.iter().map(|m| m.id).collect()
}

/// In-process cache that fails every call while switched off, and can
/// evict a chat's keys just before each window push.
pub struct FlakyCache {
    inner: MemoryCache,
    failing: AtomicBool,
    evict_on_push: AtomicBool,
}

impl FlakyCache {
    pub fn new() -> Self {
        Self {
            inner: MemoryCache::new(TTL, WINDOW).expect("memory cache"),
            failing: AtomicBool::new(false),
            evict_on_push: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_evict_on_push(&self, evict: bool) {
        self.evict_on_push.store(evict, Ordering::SeqCst);
    }

    fn check(&self) -> CacheResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::Config("injected cache failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for FlakyCache {
    async fn save_chat(&self, snapshot: &ChatSnapshot) -> CacheResult<()> {
        self.check()?;
        self.inner.save_chat(snapshot).await
    }

    async fn get_chat(&self, chat_id: Uuid) -> CacheResult<ChatSnapshot> {
        self.check()?;
        self.inner.get_chat(chat_id).await
    }

    async fn add_participant(&self, chat_id: Uuid, participant_id: &str) -> CacheResult<()> {
        self.check()?;
        self.inner.add_participant(chat_id, participant_id).await
    }

    async fn delete_chat(&self, chat_id: Uuid) -> CacheResult<()> {
        self.check()?;
        self.inner.delete_chat(chat_id).await
    }

    async fn push_message(&self, chat_id: Uuid, message: &Message) -> CacheResult<bool> {
        self.check()?;
        if self.evict_on_push.load(Ordering::SeqCst) {
            self.inner.delete_chat(chat_id).await?;
        }
        self.inner.push_message(chat_id, message).await
    }

    async fn save_messages(&self, chat_id: Uuid, messages: &[Message]) -> CacheResult<()> {
        self.check()?;
        self.inner.save_messages(chat_id, messages).await
    }

    async fn get_messages(&self, chat_id: Uuid) -> CacheResult<Vec<Message>> {
        self.check()?;
        self.inner.get_messages(chat_id).await
    }

    async fn health_check(&self) -> CacheResult<()> {
        self.check()
    }
}

/// Faults injected into a [`FaultyRecords`] store. Deletes park until the
/// gate is opened; updates fail while `fail_updates` is set.
#[derive(Clone, Default)]
pub struct RecordFaults {
    started: Arc<Notify>,
    release: Arc<Notify>,
    fail_updates: Arc<AtomicBool>,
}

impl RecordFaults {
    /// Wait until a delete has reached the gate.
    pub async fn started(&self) {
        self.started.notified().await
    }

    /// Let the parked delete through.
    pub fn open(&self) {
        self.release.notify_one();
    }

    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }
}

/// Record store driven by [`RecordFaults`]. A gate that is never opened
/// stalls deletes forever.
pub struct FaultyRecords {
    inner: Arc<dyn RecordStore>,
    faults: RecordFaults,
}

impl FaultyRecords {
    pub fn wrap(inner: Arc<dyn RecordStore>, faults: RecordFaults) -> Arc<dyn RecordStore> {
        Arc::new(Self { inner, faults })
    }
}

#[async_trait]
impl ChatRepo for FaultyRecords {
    async fn save_chat(&self, chat: &ChatRecord) -> RecordResult<()> {
        self.inner.save_chat(chat).await
    }

    async fn get_chat(&self, chat_id: Uuid) -> RecordResult<ChatRecord> {
        self.inner.get_chat(chat_id).await
    }

    async fn update_chat_info(
        &self,
        owner_id: &str,
        chat_id: Uuid,
        update: &ChatUpdate,
    ) -> RecordResult<ChatRecord> {
        if self.faults.fail_updates.load(Ordering::SeqCst) {
            return Err(RecordError::Internal("injected update failure".to_string()));
        }
        self.inner.update_chat_info(owner_id, chat_id, update).await
    }

    async fn update_image_url(&self, chat_id: Uuid, image: &PresignedUrl) -> RecordResult<()> {
        self.inner.update_image_url(chat_id, image).await
    }

    async fn add_participant(
        &self,
        owner_id: &str,
        chat_id: Uuid,
        participant_id: &str,
    ) -> RecordResult<()> {
        self.inner
            .add_participant(owner_id, chat_id, participant_id)
            .await
    }

    async fn delete_chat(&self, owner_id: &str, chat_id: Uuid) -> RecordResult<()> {
        self.faults.started.notify_one();
        self.faults.release.notified().await;
        self.inner.delete_chat(owner_id, chat_id).await
    }

    async fn get_user_chats(&self, user_id: &str) -> RecordResult<Vec<ChatPreview>> {
        self.inner.get_user_chats(user_id).await
    }
}

#[async_trait]
impl MessageRepo for FaultyRecords {
    async fn append_message(&self, chat_id: Uuid, message: &Message) -> RecordResult<()> {
        self.inner.append_message(chat_id, message).await
    }

    async fn get_messages(
        &self,
        chat_id: Uuid,
        from: usize,
        to: usize,
    ) -> RecordResult<Vec<Message>> {
        self.inner.get_messages(chat_id, from, to).await
    }

    async fn message_count(&self, chat_id: Uuid) -> RecordResult<usize> {
        self.inner.message_count(chat_id).await
    }
}

#[async_trait]
impl RecordStore for FaultyRecords {
    async fn migrate(&self) -> RecordResult<()> {
        self.inner.migrate().await
    }

    async fn health_check(&self) -> RecordResult<()> {
        self.inner.health_check().await
    }
}
