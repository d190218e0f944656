//! Cache layer for chatkeep.
//!
//! Holds two derived, TTL-bounded views of the record store:
//! - Chat snapshots (scalar fields plus a participant list)
//! - A fixed-capacity window of each chat's most recent messages
//!
//! Nothing here is authoritative. Every read may miss and callers fall back
//! to the record store.

pub mod backends;
mod codec;
pub mod error;
pub mod keys;
pub mod traits;
pub mod window;

pub use backends::{MemoryCache, RedisCache};
pub use error::{CacheError, CacheResult};
pub use traits::CacheStore;

use chatkeep_core::config::{CacheBackendConfig, CacheConfig};
use std::sync::Arc;

/// Create a cache from configuration.
pub async fn from_config(config: &CacheConfig) -> CacheResult<Arc<dyn CacheStore>> {
    match &config.backend {
        CacheBackendConfig::Memory => {
            tracing::warn!("Using in-process cache; entries are not shared between instances");
            let cache = MemoryCache::new(config.ttl(), config.window_capacity)?;
            Ok(Arc::new(cache) as Arc<dyn CacheStore>)
        }
        CacheBackendConfig::Redis { url } => {
            let cache = RedisCache::connect(url, config.ttl(), config.window_capacity).await?;
            Ok(Arc::new(cache) as Arc<dyn CacheStore>)
        }
    }
}
