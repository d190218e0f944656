//! Durable chat records for chatkeep.
//!
//! This crate is the system of record:
//! - Chat rows with their participant and message-id lists
//! - The append-only message log and positional range reads
//! - Owner-scoped partial updates built from [`ChatUpdate`]
//!
//! Two backends implement [`RecordStore`]: [`SqliteStore`] and [`PostgresStore`].

pub mod error;
pub mod models;
pub mod postgres;
pub mod repos;
pub mod store;
pub mod update;

pub use error::{RecordError, RecordResult};
pub use postgres::PostgresStore;
pub use repos::{ChatRepo, MessageRepo};
pub use store::{RecordStore, SqliteStore};
pub use update::{ChatColumn, ChatUpdate, Placeholder, UpdateStatement, UpdateValue};

use chatkeep_core::config::RecordsConfig;
use std::sync::Arc;

/// Create a record store from configuration.
pub async fn from_config(config: &RecordsConfig) -> RecordResult<Arc<dyn RecordStore>> {
    match config {
        RecordsConfig::Sqlite {
            path,
            busy_timeout_secs,
        } => {
            let store = SqliteStore::new(path, *busy_timeout_secs).await?;
            Ok(Arc::new(store) as Arc<dyn RecordStore>)
        }
        RecordsConfig::Postgres {
            url,
            host,
            port,
            username,
            password,
            database,
            ssl_mode,
            max_connections,
            statement_timeout_ms,
        } => {
            let store = if let Some(url) = url {
                tracing::info!("Connecting to PostgreSQL using connection URL");
                PostgresStore::from_url(url, *max_connections, *statement_timeout_ms).await?
            } else if let (Some(host), Some(database)) = (host.as_ref(), database.as_ref()) {
                PostgresStore::from_params(
                    host,
                    port.unwrap_or(5432),
                    username.as_deref(),
                    password.as_deref(),
                    database,
                    *ssl_mode,
                    *max_connections,
                    *statement_timeout_ms,
                )
                .await?
            } else {
                return Err(RecordError::Config(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ));
            };
            Ok(Arc::new(store) as Arc<dyn RecordStore>)
        }
    }
}
