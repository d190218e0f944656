//! Object store trait.

use crate::error::BlobResult;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Key/value object storage able to mint time-limited read links.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object, replacing any existing one.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> BlobResult<()>;

    /// Whether an object exists.
    async fn exists(&self, key: &str) -> BlobResult<bool>;

    /// Delete an object. Returns `NotFound` if it does not exist.
    async fn delete(&self, key: &str) -> BlobResult<()>;

    /// Presigned GET URL valid for `expires_in`. Does not check that the
    /// object exists.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> BlobResult<String>;

    /// Check backend connectivity.
    async fn health_check(&self) -> BlobResult<()>;
}
