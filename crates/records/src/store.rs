//! Record store trait and the SQLite implementation.

use crate::error::{RecordError, RecordResult};
use crate::models::{SqliteChatRow, SqliteMessageRow, SqlitePreviewRow};
use crate::repos::{ChatRepo, MessageRepo};
use crate::update::{ChatUpdate, Placeholder, UpdateValue};
use async_trait::async_trait;
use chatkeep_core::{ChatPreview, ChatRecord, Message, PresignedUrl};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::types::Json;
use sqlx::{Pool, Sqlite, SqliteConnection};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

/// Combined record store trait.
#[async_trait]
pub trait RecordStore: ChatRepo + MessageRepo + Send + Sync {
    /// Apply the embedded schema. Idempotent.
    async fn migrate(&self) -> RecordResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> RecordResult<()>;
}

/// SQLite-based record store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path`. `:memory:` opens a
    /// private in-memory database that lives as long as the store.
    pub async fn new(path: impl AsRef<Path>, busy_timeout_secs: u64) -> RecordResult<Self> {
        let path = path.as_ref();
        let in_memory = path.as_os_str() == ":memory:";

        let opts = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        };
        let opts = opts
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(busy_timeout_secs));

        // A single connection serializes writers. For `:memory:` it must also
        // never be recycled, or the database goes with it.
        let mut pool_opts = SqlitePoolOptions::new().max_connections(1);
        if in_memory {
            pool_opts = pool_opts
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_opts.connect_with(opts).await?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::info!(path = %path.display(), "Opened SQLite record store");
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

/// Tell a missing chat apart from one owned by someone else after a scoped
/// statement matched nothing.
async fn scope_miss(conn: &mut SqliteConnection, owner_id: &str, chat_id: Uuid) -> RecordError {
    let owner: Result<Option<String>, sqlx::Error> =
        sqlx::query_scalar("SELECT owner_id FROM chats WHERE id = ?")
            .bind(chat_id.hyphenated())
            .fetch_optional(&mut *conn)
            .await;
    match owner {
        Ok(None) => RecordError::NotFound(format!("chat {chat_id}")),
        Ok(Some(_)) => {
            RecordError::PermissionDenied(format!("user {owner_id} does not own chat {chat_id}"))
        }
        Err(e) => e.into(),
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn migrate(&self) -> RecordResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> RecordResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatRepo for SqliteStore {
    #[instrument(skip(self, chat), fields(backend = "sqlite", chat_id = %chat.id))]
    async fn save_chat(&self, chat: &ChatRecord) -> RecordResult<()> {
        sqlx::query(
            r#"
            INSERT INTO chats (id, name, description, owner_id, avatar_key, image_url,
                               image_expire_at, participant_ids, message_ids)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(chat.id.hyphenated())
        .bind(&chat.name)
        .bind(&chat.description)
        .bind(&chat.owner_id)
        .bind(&chat.avatar_key)
        .bind(&chat.image_url)
        .bind(chat.image_expire_at)
        .bind(Json(&chat.participant_ids))
        .bind(Json(&chat.message_ids))
        .execute(&self.pool)
        .await
        .map_err(|e| RecordError::from_insert(e, || format!("chat {}", chat.id)))?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn get_chat(&self, chat_id: Uuid) -> RecordResult<ChatRecord> {
        sqlx::query_as::<_, SqliteChatRow>("SELECT * FROM chats WHERE id = ?")
            .bind(chat_id.hyphenated())
            .fetch_optional(&self.pool)
            .await?
            .map(ChatRecord::from)
            .ok_or_else(|| RecordError::NotFound(format!("chat {chat_id}")))
    }

    #[instrument(skip(self, update), fields(backend = "sqlite"))]
    async fn update_chat_info(
        &self,
        owner_id: &str,
        chat_id: Uuid,
        update: &ChatUpdate,
    ) -> RecordResult<ChatRecord> {
        let statement = update
            .render(Placeholder::Positional)
            .ok_or(RecordError::EmptyUpdate)?;

        let mut tx = self.pool.begin().await?;

        let mut query = sqlx::query(&statement.sql);
        for value in statement.values {
            query = match value {
                UpdateValue::Text(text) => query.bind(text),
                UpdateValue::Timestamp(ts) => query.bind(ts),
            };
        }
        let result = query
            .bind(chat_id.hyphenated())
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(scope_miss(&mut tx, owner_id, chat_id).await);
        }

        let row = sqlx::query_as::<_, SqliteChatRow>("SELECT * FROM chats WHERE id = ?")
            .bind(chat_id.hyphenated())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    #[instrument(skip(self, image), fields(backend = "sqlite"))]
    async fn update_image_url(&self, chat_id: Uuid, image: &PresignedUrl) -> RecordResult<()> {
        let result =
            sqlx::query("UPDATE chats SET image_url = ?, image_expire_at = ? WHERE id = ?")
                .bind(&image.url)
                .bind(image.expire_at)
                .bind(chat_id.hyphenated())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RecordError::NotFound(format!("chat {chat_id}")));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn add_participant(
        &self,
        owner_id: &str,
        chat_id: Uuid,
        participant_id: &str,
    ) -> RecordResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE chats SET participant_ids = json_insert(participant_ids, '$[#]', ?) \
             WHERE id = ? AND owner_id = ?",
        )
        .bind(participant_id)
        .bind(chat_id.hyphenated())
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(scope_miss(&mut tx, owner_id, chat_id).await);
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn delete_chat(&self, owner_id: &str, chat_id: Uuid) -> RecordResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM chats WHERE id = ? AND owner_id = ?")
            .bind(chat_id.hyphenated())
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(scope_miss(&mut tx, owner_id, chat_id).await);
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn get_user_chats(&self, user_id: &str) -> RecordResult<Vec<ChatPreview>> {
        let rows = sqlx::query_as::<_, SqlitePreviewRow>(
            r#"
            SELECT id, name, avatar_key, image_url, image_expire_at
            FROM chats
            WHERE EXISTS (SELECT 1 FROM json_each(chats.participant_ids) WHERE value = ?)
            ORDER BY name, id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(RecordError::NotFound(format!("chats for user {user_id}")));
        }
        Ok(rows.into_iter().map(ChatPreview::from).collect())
    }
}

#[async_trait]
impl MessageRepo for SqliteStore {
    #[instrument(skip(self, message), fields(backend = "sqlite", message_id = %message.id))]
    async fn append_message(&self, chat_id: Uuid, message: &Message) -> RecordResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE chats SET message_ids = json_insert(message_ids, '$[#]', ?) WHERE id = ?",
        )
        .bind(message.id.hyphenated())
        .bind(chat_id.hyphenated())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RecordError::NotFound(format!("chat {chat_id}")));
        }

        sqlx::query(
            "INSERT INTO messages (id, chat_id, sender_id, body, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(message.id.hyphenated())
        .bind(chat_id.hyphenated())
        .bind(&message.sender_id)
        .bind(&message.body)
        .bind(message.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| RecordError::from_insert(e, || format!("message {}", message.id)))?;

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn get_messages(
        &self,
        chat_id: Uuid,
        from: usize,
        to: usize,
    ) -> RecordResult<Vec<Message>> {
        if from > to {
            return Err(RecordError::InvalidRange { from, to });
        }

        let rows = sqlx::query_as::<_, SqliteMessageRow>(
            r#"
            SELECT m.id, m.sender_id, m.body, m.created_at
            FROM chats c, json_each(c.message_ids) AS j
            JOIN messages m ON m.id = j.value
            WHERE c.id = ? AND j.key >= ? AND j.key < ?
            ORDER BY m.created_at, j.key
            "#,
        )
        .bind(chat_id.hyphenated())
        .bind(position(from)?)
        .bind(position(to)?)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            // Distinguish an empty slice from a missing chat.
            self.message_count(chat_id).await?;
        }
        Ok(rows.into_iter().map(Message::from).collect())
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn message_count(&self, chat_id: Uuid) -> RecordResult<usize> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT json_array_length(message_ids) FROM chats WHERE id = ?")
                .bind(chat_id.hyphenated())
                .fetch_optional(&self.pool)
                .await?;
        let count = count.ok_or_else(|| RecordError::NotFound(format!("chat {chat_id}")))?;
        usize::try_from(count)
            .map_err(|_| RecordError::Internal(format!("negative message count {count}")))
    }
}

fn position(index: usize) -> RecordResult<i64> {
    i64::try_from(index).map_err(|_| RecordError::Internal(format!("position {index} too large")))
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS chats (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    owner_id TEXT NOT NULL,
    avatar_key TEXT NOT NULL,
    image_url TEXT NOT NULL,
    image_expire_at TEXT NOT NULL,
    -- JSON arrays, append order
    participant_ids TEXT NOT NULL DEFAULT '[]',
    message_ids TEXT NOT NULL DEFAULT '[]'
);
CREATE INDEX IF NOT EXISTS idx_chats_owner ON chats(owner_id);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    chat_id TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
    sender_id TEXT NOT NULL,
    body TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages(chat_id);
"#;
