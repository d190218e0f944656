//! Redis cache backend.

use crate::codec::CachedChat;
use crate::error::{CacheError, CacheResult};
use crate::keys::{self, WINDOW_SEQ_FIELD};
use crate::traits::CacheStore;
use crate::window;
use async_trait::async_trait;
use chatkeep_core::{ChatSnapshot, Message};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::collections::HashMap;
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

/// Appends one message to the ring in a single round trip.
///
/// KEYS[1] window hash; ARGV[1] encoded message, ARGV[2] capacity,
/// ARGV[3] ttl seconds. Returns the new sequence number, or 0 when the
/// window does not exist.
const PUSH_MESSAGE_LUA: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return 0
end
local seq = redis.call('HINCRBY', KEYS[1], 'seq', 1)
local slot = (seq - 1) % tonumber(ARGV[2])
redis.call('HSET', KEYS[1], tostring(slot), ARGV[1])
redis.call('EXPIRE', KEYS[1], tonumber(ARGV[3]))
return seq
"#;

/// Redis-backed cache sharing one auto-reconnecting connection.
pub struct RedisCache {
    conn: ConnectionManager,
    ttl_secs: i64,
    window_capacity: usize,
    push_script: Script,
}

impl RedisCache {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(url: &str, ttl: Duration, window_capacity: usize) -> CacheResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!(window_capacity, ttl_secs = ttl.as_secs(), "Connected to Redis cache");
        Self::with_connection(conn, ttl, window_capacity)
    }

    /// Wrap an existing connection.
    pub fn with_connection(
        conn: ConnectionManager,
        ttl: Duration,
        window_capacity: usize,
    ) -> CacheResult<Self> {
        let ttl_secs = i64::try_from(ttl.as_secs())
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| CacheError::Config(format!("invalid cache ttl {ttl:?}")))?;
        if window_capacity == 0 {
            return Err(CacheError::Config(
                "window capacity must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            conn,
            ttl_secs,
            window_capacity,
            push_script: Script::new(PUSH_MESSAGE_LUA),
        })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }

    fn encode_message(message: &Message) -> CacheResult<String> {
        Ok(serde_json::to_string(message)?)
    }

    /// Rebuild the ordered window from a raw `HGETALL` reply.
    fn decode_window(
        &self,
        chat_id: Uuid,
        raw: HashMap<String, String>,
    ) -> CacheResult<Vec<Message>> {
        let miss = |why: &str| CacheError::Miss(format!("window for chat {chat_id}: {why}"));

        let seq: u64 = raw
            .get(WINDOW_SEQ_FIELD)
            .ok_or_else(|| miss("no sequence counter"))?
            .parse()
            .map_err(|_| miss("bad sequence counter"))?;

        window::read_order(seq, self.window_capacity)
            .map(|slot| {
                let encoded = raw
                    .get(&slot.to_string())
                    .ok_or_else(|| miss("missing slot"))?;
                serde_json::from_str(encoded).map_err(|_| miss("undecodable slot"))
            })
            .collect()
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    #[instrument(skip(self, snapshot), fields(backend = "redis", chat_id = %snapshot.id))]
    async fn save_chat(&self, snapshot: &ChatSnapshot) -> CacheResult<()> {
        let scalar = serde_json::to_string(&CachedChat::from(snapshot))?;
        let list_key = keys::participants(snapshot.id);

        // Batched but not MULTI: a partial write leaves at worst a snapshot
        // without its list, which reads as an empty list.
        let mut pipe = redis::pipe();
        pipe.set_ex(keys::chat(snapshot.id), scalar, self.ttl_secs as u64)
            .ignore()
            .del(&list_key)
            .ignore();
        if !snapshot.participant_ids.is_empty() {
            pipe.rpush(&list_key, &snapshot.participant_ids)
                .ignore()
                .expire(&list_key, self.ttl_secs)
                .ignore();
        }

        let (): () = pipe.query_async(&mut self.conn()).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn get_chat(&self, chat_id: Uuid) -> CacheResult<ChatSnapshot> {
        let chat_key = keys::chat(chat_id);
        let list_key = keys::participants(chat_id);

        let (raw, _, participants, _): (Option<String>, bool, Vec<String>, bool) = redis::pipe()
            .get(&chat_key)
            .expire(&chat_key, self.ttl_secs)
            .lrange(&list_key, 0, -1)
            .expire(&list_key, self.ttl_secs)
            .query_async(&mut self.conn())
            .await?;

        let raw = raw.ok_or_else(|| CacheError::Miss(format!("chat {chat_id}")))?;
        let cached: CachedChat = serde_json::from_str(&raw).map_err(|e| {
            tracing::debug!(chat_id = %chat_id, error = %e, "Discarding undecodable snapshot");
            CacheError::Miss(format!("chat {chat_id}: undecodable snapshot"))
        })?;

        Ok(cached.into_snapshot(participants))
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn add_participant(&self, chat_id: Uuid, participant_id: &str) -> CacheResult<()> {
        let list_key = keys::participants(chat_id);
        let mut conn = self.conn();

        let len: i64 = conn.rpush_exists(&list_key, participant_id).await?;
        if len == 0 {
            // No list to extend; drop the snapshot rather than serve a stale one.
            let (): () = conn.del(keys::chat(chat_id)).await?;
            return Ok(());
        }

        let (): () = redis::pipe()
            .expire(&list_key, self.ttl_secs)
            .ignore()
            .expire(keys::chat(chat_id), self.ttl_secs)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn delete_chat(&self, chat_id: Uuid) -> CacheResult<()> {
        let (): () = self
            .conn()
            .del(vec![
                keys::chat(chat_id),
                keys::participants(chat_id),
                keys::window(chat_id),
            ])
            .await?;
        Ok(())
    }

    #[instrument(skip(self, message), fields(backend = "redis", message_id = %message.id))]
    async fn push_message(&self, chat_id: Uuid, message: &Message) -> CacheResult<bool> {
        let encoded = Self::encode_message(message)?;
        let seq: i64 = self
            .push_script
            .key(keys::window(chat_id))
            .arg(encoded)
            .arg(self.window_capacity)
            .arg(self.ttl_secs)
            .invoke_async(&mut self.conn())
            .await?;
        if seq == 0 {
            return Ok(false);
        }
        tracing::trace!(seq, "Pushed message into window");
        Ok(true)
    }

    #[instrument(skip(self, messages), fields(backend = "redis", count = messages.len()))]
    async fn save_messages(&self, chat_id: Uuid, messages: &[Message]) -> CacheResult<()> {
        let key = keys::window(chat_id);
        let tail = &messages[messages.len().saturating_sub(self.window_capacity)..];

        let mut fields: Vec<(String, String)> = Vec::with_capacity(tail.len() + 1);
        fields.push((WINDOW_SEQ_FIELD.to_string(), tail.len().to_string()));
        for (seq, message) in (1u64..).zip(tail) {
            let slot = window::slot_for(seq, self.window_capacity);
            fields.push((slot.to_string(), Self::encode_message(message)?));
        }

        let (): () = redis::pipe()
            .atomic()
            .del(&key)
            .ignore()
            .hset_multiple(&key, &fields)
            .ignore()
            .expire(&key, self.ttl_secs)
            .ignore()
            .query_async(&mut self.conn())
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn get_messages(&self, chat_id: Uuid) -> CacheResult<Vec<Message>> {
        let raw: HashMap<String, String> = self.conn().hgetall(keys::window(chat_id)).await?;
        if raw.is_empty() {
            return Err(CacheError::Miss(format!("window for chat {chat_id}")));
        }
        self.decode_window(chat_id, raw)
    }

    async fn health_check(&self) -> CacheResult<()> {
        let _: String = redis::cmd("PING").query_async(&mut self.conn()).await?;
        Ok(())
    }
}
