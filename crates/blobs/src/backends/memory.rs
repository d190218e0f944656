//! In-process object store.

use crate::error::{BlobError, BlobResult};
use crate::traits::ObjectStore;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::instrument;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
}

/// Object store held in memory. Issued URLs are unsigned and carry the
/// expiry as a query parameter.
#[derive(Debug)]
pub struct MemoryBackend {
    base_url: String,
    objects: DashMap<String, StoredObject>,
}

impl MemoryBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: DashMap::new(),
        }
    }

    /// Stored bytes and content type for `key`.
    pub fn get(&self, key: &str) -> Option<(Bytes, String)> {
        self.objects
            .get(key)
            .map(|o| (o.data.clone(), o.content_type.clone()))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    #[instrument(skip(self, data), fields(backend = "memory", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> BlobResult<()> {
        if key.is_empty() {
            return Err(BlobError::InvalidKey("empty key".to_string()));
        }
        self.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> BlobResult<bool> {
        Ok(self.objects.contains_key(key))
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> BlobResult<String> {
        let expires = OffsetDateTime::now_utc() + expires_in;
        Ok(format!(
            "{}/{}?expires={}",
            self.base_url,
            key,
            expires.unix_timestamp()
        ))
    }

    async fn health_check(&self) -> BlobResult<()> {
        Ok(())
    }
}
