//! Chat, message and avatar domain types.

use crate::error::{Error, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A time-limited read link for a blob-store object.
///
/// Only `expire_at` is meaningful to persist: the URL itself is regenerated
/// whenever the stored expiry has passed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresignedUrl {
    pub url: String,
    pub expire_at: OffsetDateTime,
}

/// Durable chat record, owned by the record store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatRecord {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub owner_id: String,
    /// Blob key backing the chat image: the chat id for uploaded avatars,
    /// the default avatar key otherwise.
    pub avatar_key: String,
    pub image_url: String,
    pub image_expire_at: OffsetDateTime,
    /// Participant ids in insertion order. The owner is always present.
    pub participant_ids: Vec<String>,
    /// Message ids in append order.
    pub message_ids: Vec<Uuid>,
}

impl ChatRecord {
    /// Build a fresh record whose only participant is the owner.
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        description: impl Into<String>,
        owner_id: impl Into<String>,
        avatar_key: impl Into<String>,
        image: PresignedUrl,
    ) -> Self {
        let owner_id = owner_id.into();
        Self {
            id,
            name: name.into(),
            description: description.into(),
            participant_ids: vec![owner_id.clone()],
            owner_id,
            avatar_key: avatar_key.into(),
            image_url: image.url,
            image_expire_at: image.expire_at,
            message_ids: Vec::new(),
        }
    }

    /// Cacheable view of this record.
    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            owner_id: self.owner_id.clone(),
            avatar_key: self.avatar_key.clone(),
            image_url: self.image_url.clone(),
            image_expire_at: self.image_expire_at,
            participant_ids: self.participant_ids.clone(),
        }
    }

}

/// Cached copy of a chat, derived from [`ChatRecord`] without the message log.
///
/// Its cache TTL is unrelated to `image_expire_at`; a cached snapshot may
/// carry an expired image URL, which readers refresh before surfacing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatSnapshot {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub owner_id: String,
    pub avatar_key: String,
    pub image_url: String,
    pub image_expire_at: OffsetDateTime,
    pub participant_ids: Vec<String>,
}

impl ChatSnapshot {
    /// Whether the image URL is no longer usable at `now`.
    pub fn image_expired(&self, now: OffsetDateTime) -> bool {
        self.image_expire_at <= now
    }

    pub fn set_image(&mut self, image: PresignedUrl) {
        self.image_url = image.url;
        self.image_expire_at = image.expire_at;
    }
}

/// Summary row returned when listing a user's chats.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatPreview {
    pub id: Uuid,
    pub name: String,
    pub avatar_key: String,
    pub image_url: String,
    pub image_expire_at: OffsetDateTime,
}

impl ChatPreview {
    pub fn image_expired(&self, now: OffsetDateTime) -> bool {
        self.image_expire_at <= now
    }

    pub fn set_image(&mut self, image: PresignedUrl) {
        self.image_url = image.url;
        self.image_expire_at = image.expire_at;
    }
}

/// A chat message. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: String,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Message {
    /// Create a new message stamped with the current time.
    pub fn new(sender_id: impl Into<String>, body: impl Into<String>) -> Result<Self> {
        let body = body.into();
        if body.trim().is_empty() {
            return Err(Error::EmptyBody);
        }
        let sender_id = sender_id.into();
        if sender_id.is_empty() {
            return Err(Error::EmptyField("sender id"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            sender_id,
            body,
            created_at: OffsetDateTime::now_utc(),
        })
    }
}

/// Avatar bytes in flight to the blob store. Never persisted as such.
#[derive(Clone, Debug)]
pub struct Avatar {
    pub id: String,
    pub data: Bytes,
}

impl Avatar {
    pub fn new(id: impl Into<String>, data: Bytes) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// Requested changes to a chat's descriptive fields.
///
/// Blank `name`/`description` mean "leave unchanged". `avatar` is tri-state
/// only in the sense that `None` leaves the image alone and `Some` replaces it.
#[derive(Clone, Debug, Default)]
pub struct ChatInfoUpdate {
    pub name: String,
    pub description: String,
    pub avatar: Option<Bytes>,
}

impl ChatInfoUpdate {
    pub fn name(&self) -> Option<&str> {
        non_blank(&self.name)
    }

    pub fn description(&self) -> Option<&str> {
        non_blank(&self.description)
    }

    /// Reject updates that would change nothing.
    pub fn validate(&self) -> Result<()> {
        if self.name().is_none() && self.description().is_none() && self.avatar.is_none() {
            return Err(Error::NothingToUpdate);
        }
        Ok(())
    }
}

fn non_blank(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Validate a chat name at creation time.
pub fn validate_chat_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::EmptyName);
    }
    Ok(())
}
