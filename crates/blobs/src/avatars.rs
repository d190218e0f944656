//! Avatar storage on top of an [`ObjectStore`].

use crate::error::{BlobError, BlobResult};
use crate::traits::ObjectStore;
use chatkeep_core::config::BlobsConfig;
use chatkeep_core::{Avatar, PresignedUrl};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::instrument;

/// Where an avatar lives and a fresh link to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AvatarLink {
    /// Object key: the avatar id for uploads, the default key otherwise.
    pub key: String,
    pub url: PresignedUrl,
}

/// Stores avatar images and issues presigned read URLs for them.
///
/// Every URL is valid for the same window, counted from the moment it is
/// issued. Chats without an uploaded image point at a shared default object
/// that is never written or deleted through this type.
#[derive(Clone)]
pub struct AvatarStore {
    objects: Arc<dyn ObjectStore>,
    url_ttl: Duration,
    default_key: String,
    content_type: String,
}

impl std::fmt::Debug for AvatarStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvatarStore")
            .field("url_ttl", &self.url_ttl)
            .field("default_key", &self.default_key)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl AvatarStore {
    pub fn new(objects: Arc<dyn ObjectStore>, config: &BlobsConfig) -> Self {
        Self {
            objects,
            url_ttl: config.url_ttl(),
            default_key: config.default_avatar.clone(),
            content_type: config.content_type.clone(),
        }
    }

    pub fn default_key(&self) -> &str {
        &self.default_key
    }

    pub fn url_ttl(&self) -> Duration {
        self.url_ttl
    }

    /// Upload `avatar` under its id, or fall back to the default object when
    /// there is none, and return a fresh link.
    #[instrument(skip(self, avatar), fields(avatar_id = avatar.map(|a| a.id.as_str())))]
    pub async fn save_avatar(&self, avatar: Option<&Avatar>) -> BlobResult<AvatarLink> {
        let Some(avatar) = avatar else {
            return self.default_link().await;
        };
        self.check_key(&avatar.id)?;
        self.objects
            .put(&avatar.id, avatar.data.clone(), &self.content_type)
            .await?;
        self.link(&avatar.id).await
    }

    /// Fresh presigned URL for `key`, independent of any URL issued before.
    #[instrument(skip(self))]
    pub async fn get_url(&self, key: &str) -> BlobResult<PresignedUrl> {
        // Take the timestamp first so the signature never expires before
        // the reported expiry.
        let expire_at = OffsetDateTime::now_utc() + self.url_ttl;
        let url = self.objects.presign_get(key, self.url_ttl).await?;
        Ok(PresignedUrl { url, expire_at })
    }

    /// Replace an avatar: delete the old object, then write the new one.
    ///
    /// Not atomic. If the write fails after the delete succeeded the object
    /// is gone until the next successful update.
    #[instrument(skip(self, avatar), fields(avatar_id = %avatar.id))]
    pub async fn update_avatar(&self, avatar: &Avatar) -> BlobResult<AvatarLink> {
        self.check_key(&avatar.id)?;
        match self.objects.delete(&avatar.id).await {
            Ok(()) | Err(BlobError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        self.save_avatar(Some(avatar)).await
    }

    /// Remove an uploaded avatar and return the default link to show instead.
    #[instrument(skip(self))]
    pub async fn delete_avatar(&self, key: &str) -> BlobResult<AvatarLink> {
        self.check_key(key)?;
        self.objects.delete(key).await?;
        self.default_link().await
    }

    pub async fn health_check(&self) -> BlobResult<()> {
        self.objects.health_check().await
    }

    async fn default_link(&self) -> BlobResult<AvatarLink> {
        self.link(&self.default_key).await
    }

    async fn link(&self, key: &str) -> BlobResult<AvatarLink> {
        Ok(AvatarLink {
            key: key.to_string(),
            url: self.get_url(key).await?,
        })
    }

    fn check_key(&self, key: &str) -> BlobResult<()> {
        if key.is_empty() {
            return Err(BlobError::InvalidKey("empty avatar id".to_string()));
        }
        if key == self.default_key {
            return Err(BlobError::InvalidKey(format!(
                "{key} is the shared default avatar"
            )));
        }
        Ok(())
    }
}
