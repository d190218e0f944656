//! Cache test utilities.

#![allow(dead_code)]

use chatkeep_cache::{CacheError, CacheResult, CacheStore, MemoryCache, RedisCache};
use chatkeep_core::{ChatRecord, ChatSnapshot, PresignedUrl};
use std::sync::Arc;
use std::time::Duration;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::{REDIS_PORT, Redis};
use time::OffsetDateTime;
use uuid::Uuid;

/// Marker for Docker/container startup failures; tests skip on it.
pub const REDIS_CONTAINER_START_ERR_PREFIX: &str = "redis-container-start:";

pub const TTL: Duration = Duration::from_secs(60);
pub const WINDOW: usize = 10;

/// Redis cache backed by a testcontainer.
pub struct RedisTestCache {
    pub cache: Arc<RedisCache>,
    _container: ContainerAsync<Redis>,
}

impl RedisTestCache {
    pub async fn new() -> CacheResult<Self> {
        let container = Redis::default().start().await.map_err(|e| {
            CacheError::Config(format!(
                "{} Failed to start Redis container: {e}",
                REDIS_CONTAINER_START_ERR_PREFIX
            ))
        })?;

        let host = container.get_host().await.expect("Failed to get host");
        let port = container
            .get_host_port_ipv4(REDIS_PORT)
            .await
            .expect("Failed to get port");

        let cache = RedisCache::connect(&format!("redis://{host}:{port}"), TTL, WINDOW).await?;
        Ok(Self {
            cache: Arc::new(cache),
            _container: container,
        })
    }

    pub fn store(&self) -> Arc<dyn CacheStore> {
        self.cache.clone()
    }
}

/// Run a test against the memory backend and, when Docker is available and
/// SKIP_REDIS_TESTS is unset, against Redis.
pub async fn run_cache_test_both<F, Fut>(test_fn: F)
where
    F: Fn(Arc<dyn CacheStore>) -> Fut + Clone,
    Fut: std::future::Future<Output = ()>,
{
    let memory = Arc::new(MemoryCache::new(TTL, WINDOW).expect("memory cache"));
    test_fn.clone()(memory).await;

    if std::env::var("SKIP_REDIS_TESTS").is_ok() {
        return;
    }
    match RedisTestCache::new().await {
        Ok(redis) => test_fn(redis.store()).await,
        Err(err) => {
            let msg = err.to_string();
            if msg.contains(REDIS_CONTAINER_START_ERR_PREFIX) {
                eprintln!("Skipping Redis cache tests (Docker unavailable): {msg}");
            } else {
                panic!("Redis test setup failed: {msg}");
            }
        }
    }
}

pub fn snapshot(owner: &str) -> ChatSnapshot {
    ChatRecord::new(
        Uuid::new_v4(),
        "general",
        "desc",
        owner,
        chatkeep_core::DEFAULT_AVATAR_KEY,
        PresignedUrl {
            url: "https://blobs.test/avatar.png".to_string(),
            // RFC 3339 in the cache keeps full precision; whole seconds keep
            // equality checks simple.
            expire_at: OffsetDateTime::from_unix_timestamp(4_102_444_800).expect("valid timestamp"),
        },
    )
    .snapshot()
}
