//! Database rows mapping to the record schema.
//!
//! PostgreSQL stores ids as `UUID` and lists as native arrays. SQLite stores
//! ids as hyphenated text and lists as JSON arrays, so that message ids inside
//! `chats.message_ids` compare equal to `messages.id`.

use chatkeep_core::{ChatPreview, ChatRecord, Message};
use sqlx::FromRow;
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;
use uuid::fmt::Hyphenated;

// =============================================================================
// PostgreSQL
// =============================================================================

/// Full chat row.
#[derive(Debug, Clone, FromRow)]
pub struct ChatRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub owner_id: String,
    pub avatar_key: String,
    pub image_url: String,
    pub image_expire_at: OffsetDateTime,
    pub participant_ids: Vec<String>,
    pub message_ids: Vec<Uuid>,
}

impl From<ChatRow> for ChatRecord {
    fn from(row: ChatRow) -> Self {
        ChatRecord {
            id: row.id,
            name: row.name,
            description: row.description,
            owner_id: row.owner_id,
            avatar_key: row.avatar_key,
            image_url: row.image_url,
            image_expire_at: row.image_expire_at,
            participant_ids: row.participant_ids,
            message_ids: row.message_ids,
        }
    }
}

/// Chat listing row.
#[derive(Debug, Clone, FromRow)]
pub struct PreviewRow {
    pub id: Uuid,
    pub name: String,
    pub avatar_key: String,
    pub image_url: String,
    pub image_expire_at: OffsetDateTime,
}

impl From<PreviewRow> for ChatPreview {
    fn from(row: PreviewRow) -> Self {
        ChatPreview {
            id: row.id,
            name: row.name,
            avatar_key: row.avatar_key,
            image_url: row.image_url,
            image_expire_at: row.image_expire_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub sender_id: String,
    pub body: String,
    pub created_at: OffsetDateTime,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: row.id,
            sender_id: row.sender_id,
            body: row.body,
            created_at: row.created_at,
        }
    }
}

// =============================================================================
// SQLite
// =============================================================================

/// Full chat row with JSON-encoded lists.
#[derive(Debug, Clone, FromRow)]
pub struct SqliteChatRow {
    pub id: Hyphenated,
    pub name: String,
    pub description: String,
    pub owner_id: String,
    pub avatar_key: String,
    pub image_url: String,
    pub image_expire_at: OffsetDateTime,
    pub participant_ids: Json<Vec<String>>,
    pub message_ids: Json<Vec<Uuid>>,
}

impl From<SqliteChatRow> for ChatRecord {
    fn from(row: SqliteChatRow) -> Self {
        ChatRecord {
            id: row.id.into_uuid(),
            name: row.name,
            description: row.description,
            owner_id: row.owner_id,
            avatar_key: row.avatar_key,
            image_url: row.image_url,
            image_expire_at: row.image_expire_at,
            participant_ids: row.participant_ids.0,
            message_ids: row.message_ids.0,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SqlitePreviewRow {
    pub id: Hyphenated,
    pub name: String,
    pub avatar_key: String,
    pub image_url: String,
    pub image_expire_at: OffsetDateTime,
}

impl From<SqlitePreviewRow> for ChatPreview {
    fn from(row: SqlitePreviewRow) -> Self {
        ChatPreview {
            id: row.id.into_uuid(),
            name: row.name,
            avatar_key: row.avatar_key,
            image_url: row.image_url,
            image_expire_at: row.image_expire_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SqliteMessageRow {
    pub id: Hyphenated,
    pub sender_id: String,
    pub body: String,
    pub created_at: OffsetDateTime,
}

impl From<SqliteMessageRow> for Message {
    fn from(row: SqliteMessageRow) -> Self {
        Message {
            id: row.id.into_uuid(),
            sender_id: row.sender_id,
            body: row.body,
            created_at: row.created_at,
        }
    }
}
