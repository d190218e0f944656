//! Record store test utilities.

#![allow(dead_code)]

use chatkeep_core::{ChatRecord, PresignedUrl};
use chatkeep_records::{PostgresStore, RecordError, RecordResult, RecordStore, SqliteStore};
use std::sync::Arc;
use tempfile::TempDir;
use testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Stable prefix for Docker/container startup failures in Postgres test setup.
/// Tests use this marker to decide whether to skip due to unavailable Docker.
pub const POSTGRES_CONTAINER_START_ERR_PREFIX: &str = "postgres-container-start:";

/// A file-backed SQLite store that cleans up on drop.
pub struct TestRecords {
    pub store: Arc<SqliteStore>,
    _temp_dir: TempDir,
}

impl TestRecords {
    pub async fn new() -> RecordResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let store = SqliteStore::new(temp_dir.path().join("test.db"), 5).await?;
        Ok(Self {
            store: Arc::new(store),
            _temp_dir: temp_dir,
        })
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        self.store.clone()
    }
}

/// PostgreSQL store backed by a testcontainer.
pub struct PostgresTestRecords {
    pub store: Arc<PostgresStore>,
    _container: ContainerAsync<Postgres>,
}

impl PostgresTestRecords {
    pub async fn new() -> RecordResult<Self> {
        let container = Postgres::default()
            .with_tag("15-alpine")
            .start()
            .await
            .map_err(|e| {
                RecordError::Internal(format!(
                    "{} Failed to start PostgreSQL container: {e}",
                    POSTGRES_CONTAINER_START_ERR_PREFIX
                ))
            })?;

        let host = container.get_host().await.expect("Failed to get host");
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("Failed to get port");

        // Default credentials from testcontainers-modules postgres
        let url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);
        let store = PostgresStore::from_url(&url, 5, None).await?;

        Ok(Self {
            store: Arc::new(store),
            _container: container,
        })
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        self.store.clone()
    }
}

/// Run a test against both SQLite and PostgreSQL backends.
///
/// PostgreSQL is skipped when SKIP_POSTGRES_TESTS is set or Docker is
/// unavailable; any other setup failure panics.
pub async fn run_records_test_both<F, Fut>(test_fn: F)
where
    F: Fn(Arc<dyn RecordStore>) -> Fut + Clone,
    Fut: std::future::Future<Output = ()>,
{
    let sqlite = TestRecords::new()
        .await
        .expect("Failed to create SQLite test records");
    test_fn.clone()(sqlite.store()).await;

    if std::env::var("SKIP_POSTGRES_TESTS").is_ok() {
        return;
    }
    match PostgresTestRecords::new().await {
        Ok(postgres) => test_fn(postgres.store()).await,
        Err(err) => {
            let msg = err.to_string();
            if msg.contains(POSTGRES_CONTAINER_START_ERR_PREFIX) {
                eprintln!("Skipping PostgreSQL records tests (Docker unavailable): {msg}");
            } else {
                panic!("PostgreSQL test setup failed: {msg}");
            }
        }
    }
}

/// Whole-second timestamp, so it survives every backend's precision.
pub fn whole_seconds(offset: Duration) -> OffsetDateTime {
    let ts = OffsetDateTime::now_utc() + offset;
    ts.replace_nanosecond(0).expect("zero is a valid nanosecond")
}

pub fn image(offset: Duration) -> PresignedUrl {
    PresignedUrl {
        url: format!("https://blobs.test/avatar.png?sig={}", Uuid::new_v4()),
        expire_at: whole_seconds(offset),
    }
}

pub fn chat(name: &str, owner: &str) -> ChatRecord {
    ChatRecord::new(
        Uuid::new_v4(),
        name,
        "desc",
        owner,
        chatkeep_core::DEFAULT_AVATAR_KEY,
        image(Duration::hours(1)),
    )
}
