//! In-process cache backend.
//!
//! Mirrors the Redis key layout with one map per key family. Expiry uses
//! `tokio::time::Instant` so tests can drive it with a paused clock.
//! Expired entries are dropped when read and by a sweep that runs at most
//! once per TTL, triggered by whichever operation comes first after it is due.

use crate::codec::CachedChat;
use crate::error::{CacheError, CacheResult};
use crate::traits::CacheStore;
use crate::window::Ring;
use async_trait::async_trait;
use chatkeep_core::{ChatSnapshot, Message};
use dashmap::DashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }

    fn touch(&mut self, ttl: Duration) {
        self.expires_at = Instant::now() + ttl;
    }
}

/// Read a live entry, sliding its TTL; drop it if expired.
fn read_live<T: Clone>(
    map: &DashMap<Uuid, Expiring<T>>,
    chat_id: Uuid,
    ttl: Duration,
) -> Option<T> {
    let now = Instant::now();
    let value = map.get_mut(&chat_id).and_then(|mut entry| {
        if entry.is_live(now) {
            entry.touch(ttl);
            Some(entry.value.clone())
        } else {
            None
        }
    });
    if value.is_none() {
        map.remove_if(&chat_id, |_, entry| !entry.is_live(now));
    }
    value
}

/// Process-local cache. Not shared between service instances.
pub struct MemoryCache {
    chats: DashMap<Uuid, Expiring<CachedChat>>,
    participants: DashMap<Uuid, Expiring<Vec<String>>>,
    windows: DashMap<Uuid, Expiring<Ring<Message>>>,
    ttl: Duration,
    window_capacity: usize,
    next_sweep: Mutex<Instant>,
}

impl MemoryCache {
    pub fn new(ttl: Duration, window_capacity: usize) -> CacheResult<Self> {
        if ttl.is_zero() {
            return Err(CacheError::Config("cache ttl must be greater than 0".to_string()));
        }
        if window_capacity == 0 {
            return Err(CacheError::Config(
                "window capacity must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            chats: DashMap::new(),
            participants: DashMap::new(),
            windows: DashMap::new(),
            ttl,
            window_capacity,
            next_sweep: Mutex::new(Instant::now() + ttl),
        })
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.chats.retain(|_, e| e.is_live(now));
        self.participants.retain(|_, e| e.is_live(now));
        self.windows.retain(|_, e| e.is_live(now));
    }

    /// Run [`MemoryCache::purge_expired`] if a TTL has passed since the last
    /// sweep. Must be called while no map entry is borrowed.
    fn maybe_sweep(&self) {
        let now = Instant::now();
        // Another task holding the lock is already sweeping.
        let Ok(mut next) = self.next_sweep.try_lock() else {
            return;
        };
        if now < *next {
            return;
        }
        *next = now + self.ttl;
        drop(next);

        self.purge_expired();
        tracing::trace!(
            chats = self.chats.len(),
            windows = self.windows.len(),
            "Swept expired cache entries"
        );
    }

    /// Number of chats with a live snapshot.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.chats.iter().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    #[instrument(skip(self, snapshot), fields(backend = "memory", chat_id = %snapshot.id))]
    async fn save_chat(&self, snapshot: &ChatSnapshot) -> CacheResult<()> {
        self.maybe_sweep();
        self.chats
            .insert(snapshot.id, Expiring::new(CachedChat::from(snapshot), self.ttl));
        self.participants.insert(
            snapshot.id,
            Expiring::new(snapshot.participant_ids.clone(), self.ttl),
        );
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn get_chat(&self, chat_id: Uuid) -> CacheResult<ChatSnapshot> {
        self.maybe_sweep();
        let cached = read_live(&self.chats, chat_id, self.ttl)
            .ok_or_else(|| CacheError::Miss(format!("chat {chat_id}")))?;
        let participants = read_live(&self.participants, chat_id, self.ttl).unwrap_or_default();
        Ok(cached.into_snapshot(participants))
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn add_participant(&self, chat_id: Uuid, participant_id: &str) -> CacheResult<()> {
        self.maybe_sweep();
        let now = Instant::now();
        let appended = match self.participants.get_mut(&chat_id) {
            Some(mut entry) if entry.is_live(now) => {
                entry.value.push(participant_id.to_string());
                entry.touch(self.ttl);
                true
            }
            _ => false,
        };

        if appended {
            if let Some(mut chat) = self.chats.get_mut(&chat_id) {
                chat.touch(self.ttl);
            }
        } else {
            self.participants.remove(&chat_id);
            self.chats.remove(&chat_id);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn delete_chat(&self, chat_id: Uuid) -> CacheResult<()> {
        self.maybe_sweep();
        self.chats.remove(&chat_id);
        self.participants.remove(&chat_id);
        self.windows.remove(&chat_id);
        Ok(())
    }

    #[instrument(skip(self, message), fields(backend = "memory", message_id = %message.id))]
    async fn push_message(&self, chat_id: Uuid, message: &Message) -> CacheResult<bool> {
        self.maybe_sweep();
        let now = Instant::now();
        let pushed = match self.windows.get_mut(&chat_id) {
            Some(mut entry) if entry.is_live(now) => {
                entry.value.push(message.clone());
                entry.touch(self.ttl);
                true
            }
            _ => false,
        };
        if !pushed {
            self.windows.remove_if(&chat_id, |_, entry| !entry.is_live(now));
        }
        Ok(pushed)
    }

    #[instrument(skip(self, messages), fields(backend = "memory", count = messages.len()))]
    async fn save_messages(&self, chat_id: Uuid, messages: &[Message]) -> CacheResult<()> {
        self.maybe_sweep();
        let ring = Ring::from_items(self.window_capacity, messages);
        self.windows.insert(chat_id, Expiring::new(ring, self.ttl));
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn get_messages(&self, chat_id: Uuid) -> CacheResult<Vec<Message>> {
        self.maybe_sweep();
        let now = Instant::now();
        let messages = self
            .windows
            .get(&chat_id)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.to_vec());
        if messages.is_none() {
            self.windows.remove_if(&chat_id, |_, entry| !entry.is_live(now));
        }
        messages.ok_or_else(|| CacheError::Miss(format!("window for chat {chat_id}")))
    }

    async fn health_check(&self) -> CacheResult<()> {
        Ok(())
    }
}
