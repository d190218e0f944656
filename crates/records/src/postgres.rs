//! PostgreSQL-based record store implementation.

use crate::error::{RecordError, RecordResult};
use crate::models::{ChatRow, MessageRow, PreviewRow};
use crate::repos::{ChatRepo, MessageRepo};
use crate::store::RecordStore;
use crate::update::{ChatUpdate, Placeholder, UpdateValue};
use async_trait::async_trait;
use chatkeep_core::config::PgSslMode;
use chatkeep_core::{ChatPreview, ChatRecord, Message, PresignedUrl};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{PgConnection, Pool, Postgres};
use std::str::FromStr;
use tracing::instrument;
use uuid::Uuid;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-based record store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> RecordResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Create a new PostgreSQL store from individual connection parameters.
    ///
    /// Lets the password arrive separately, e.g. from `CHATKEEP_RECORDS__PASSWORD`.
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> RecordResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        // Log connection info without password
        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> RecordResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

/// Tell a missing chat apart from one owned by someone else after a scoped
/// statement matched nothing.
async fn scope_miss(conn: &mut PgConnection, owner_id: &str, chat_id: Uuid) -> RecordError {
    let owner: Result<Option<String>, sqlx::Error> =
        sqlx::query_scalar("SELECT owner_id FROM chats WHERE id = $1")
            .bind(chat_id)
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

/// Convert a zero-based position into a one-based array subscript.
fn subscript(index: usize) -> RecordResult<i32> {
    index
        .checked_add(1)
        .and_then(|i| i32::try_from(i).ok())
        .ok_or_else(|| RecordError::Internal(format!("position {index} too large")))
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn migrate(&self) -> RecordResult<()> {
        // PostgreSQL doesn't allow multiple statements in a single prepared statement,
        // so we split the schema and execute each statement separately.
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> RecordResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatRepo for PostgresStore {
    #[instrument(skip(self, chat), fields(backend = "postgres", chat_id = %chat.id))]
    async fn save_chat(&self, chat: &ChatRecord) -> RecordResult<()> {
        sqlx::query(
            r#"
            INSERT INTO chats (id, name, description, owner_id, avatar_key, image_url,
                               image_expire_at, participant_ids, message_ids)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(chat.id)
        .bind(&chat.name)
        .bind(&chat.description)
        .bind(&chat.owner_id)
        .bind(&chat.avatar_key)
        .bind(&chat.image_url)
        .bind(chat.image_expire_at)
        .bind(&chat.participant_ids)
        .bind(&chat.message_ids)
        .execute(&self.pool)
        .await
        .map_err(|e| RecordError::from_insert(e, || format!("chat {}", chat.id)))?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn get_chat(&self, chat_id: Uuid) -> RecordResult<ChatRecord> {
        sqlx::query_as::<_, ChatRow>("SELECT * FROM chats WHERE id = $1")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?
            .map(ChatRecord::from)
            .ok_or_else(|| RecordError::NotFound(format!("chat {chat_id}")))
    }

    #[instrument(skip(self, update), fields(backend = "postgres"))]
    async fn update_chat_info(
        &self,
        owner_id: &str,
        chat_id: Uuid,
        update: &ChatUpdate,
    ) -> RecordResult<ChatRecord> {
        let statement = update
            .render(Placeholder::Numbered)
            .ok_or(RecordError::EmptyUpdate)?;

        let mut tx = self.pool.begin().await?;

        let mut query = sqlx::query(&statement.sql);
        for value in statement.values {
            query = match value {
                UpdateValue::Text(text) => query.bind(text),
                UpdateValue::Timestamp(ts) => query.bind(ts),
            };
        }
        let result = query.bind(chat_id).bind(owner_id).execute(&mut *tx).await?;

        if result.rows_affected() == 0 {
            return Err(scope_miss(&mut tx, owner_id, chat_id).await);
        }

        let row = sqlx::query_as::<_, ChatRow>("SELECT * FROM chats WHERE id = $1")
            .bind(chat_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    #[instrument(skip(self, image), fields(backend = "postgres"))]
    async fn update_image_url(&self, chat_id: Uuid, image: &PresignedUrl) -> RecordResult<()> {
        let result =
            sqlx::query("UPDATE chats SET image_url = $1, image_expire_at = $2 WHERE id = $3")
                .bind(&image.url)
                .bind(image.expire_at)
                .bind(chat_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RecordError::NotFound(format!("chat {chat_id}")));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn add_participant(
        &self,
        owner_id: &str,
        chat_id: Uuid,
        participant_id: &str,
    ) -> RecordResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE chats SET participant_ids = array_append(participant_ids, $1) \
             WHERE id = $2 AND owner_id = $3",
        )
        .bind(participant_id)
        .bind(chat_id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(scope_miss(&mut tx, owner_id, chat_id).await);
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn delete_chat(&self, owner_id: &str, chat_id: Uuid) -> RecordResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM chats WHERE id = $1 AND owner_id = $2")
            .bind(chat_id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(scope_miss(&mut tx, owner_id, chat_id).await);
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn get_user_chats(&self, user_id: &str) -> RecordResult<Vec<ChatPreview>> {
        let rows = sqlx::query_as::<_, PreviewRow>(
            r#"
            SELECT id, name, avatar_key, image_url, image_expire_at
            FROM chats
            WHERE participant_ids @> ARRAY[$1]::TEXT[]
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
impl MessageRepo for PostgresStore {
    #[instrument(skip(self, message), fields(backend = "postgres", message_id = %message.id))]
    async fn append_message(&self, chat_id: Uuid, message: &Message) -> RecordResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE chats SET message_ids = array_append(message_ids, $1) WHERE id = $2",
        )
        .bind(message.id)
        .bind(chat_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RecordError::NotFound(format!("chat {chat_id}")));
        }

        sqlx::query(
            "INSERT INTO messages (id, chat_id, sender_id, body, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(message.id)
        .bind(chat_id)
        .bind(&message.sender_id)
        .bind(&message.body)
        .bind(message.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| RecordError::from_insert(e, || format!("message {}", message.id)))?;

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn get_messages(
        &self,
        chat_id: Uuid,
        from: usize,
        to: usize,
    ) -> RecordResult<Vec<Message>> {
        if from > to {
            return Err(RecordError::InvalidRange { from, to });
        }
        if from == to {
            self.message_count(chat_id).await?;
            return Ok(Vec::new());
        }

        // Array slices are one-based and inclusive: positions from..to map
        // to [from + 1 : to].
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT m.id, m.sender_id, m.body, m.created_at
            FROM chats c
            CROSS JOIN LATERAL unnest(c.message_ids[$2:$3]) WITH ORDINALITY AS ids(message_id, position)
            JOIN messages m ON m.id = ids.message_id
            WHERE c.id = $1
            ORDER BY m.created_at, ids.position
            "#,
        )
        .bind(chat_id)
        .bind(subscript(from)?)
        .bind(subscript(to - 1)?)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            self.message_count(chat_id).await?;
        }
        Ok(rows.into_iter().map(Message::from).collect())
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn message_count(&self, chat_id: Uuid) -> RecordResult<usize> {
        let count: Option<i32> =
            sqlx::query_scalar("SELECT cardinality(message_ids) FROM chats WHERE id = $1")
                .bind(chat_id)
                .fetch_optional(&self.pool)
                .await?;
        let count = count.ok_or_else(|| RecordError::NotFound(format!("chat {chat_id}")))?;
        usize::try_from(count)
            .map_err(|_| RecordError::Internal(format!("negative message count {count}")))
    }
}

#[cfg(test)]
mod tests {
    use super::{postgres_schema_statements, subscript, POSTGRES_SCHEMA};

    #[test]
    fn postgres_schema_statements_skips_empty_and_comment_only() {
        let schema = r#"
            -- comment only

            CREATE TABLE foo (id int);
            ;
            -- another comment
            CREATE TABLE bar (id int);
        "#;

        let statements = postgres_schema_statements(schema);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("CREATE TABLE foo"));
        assert!(statements[1].contains("CREATE TABLE bar"));
    }

    #[test]
    fn embedded_schema_creates_both_tables() {
        let statements = postgres_schema_statements(POSTGRES_SCHEMA);
        assert!(statements.iter().any(|s| s.contains("CREATE TABLE IF NOT EXISTS chats")));
        assert!(statements.iter().any(|s| s.contains("CREATE TABLE IF NOT EXISTS messages")));
    }

    #[test]
    fn subscripts_are_one_based() {
        assert_eq!(subscript(0).unwrap(), 1);
        assert_eq!(subscript(9).unwrap(), 10);
        assert!(subscript(usize::MAX).is_err());
    }
}
