//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Orchestrator configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Upper bound on how long `delete_chat` waits for the durable delete
    /// before cancelling it and reporting a timeout.
    #[serde(default = "default_delete_timeout_ms")]
    pub delete_timeout_ms: u64,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Plain,
    /// One JSON object per event.
    Json,
}

fn default_delete_timeout_ms() -> u64 {
    5000
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            delete_timeout_ms: default_delete_timeout_ms(),
            log_format: LogFormat::default(),
        }
    }
}

impl ServiceConfig {
    pub fn delete_timeout(&self) -> Duration {
        Duration::from_millis(self.delete_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.delete_timeout_ms == 0 {
            return Err("service.delete_timeout_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// PostgreSQL SSL mode configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    /// Disable SSL/TLS entirely.
    Disable,
    /// Prefer SSL/TLS but allow unencrypted connections (default).
    #[default]
    Prefer,
    /// Require SSL/TLS for all connections.
    Require,
}

/// Record store (system of record) configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RecordsConfig {
    /// SQLite database (testing and single-node deployments).
    Sqlite {
        /// Database file path, or `:memory:`.
        path: PathBuf,
        /// Busy timeout in seconds while waiting on the write lock.
        #[serde(default = "default_sqlite_busy_timeout_secs")]
        busy_timeout_secs: u64,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL. Takes precedence over the individual fields.
        url: Option<String>,
        /// Database host.
        host: Option<String>,
        /// Database port (default: 5432).
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        username: Option<String>,
        /// WARNING: Prefer CHATKEEP_RECORDS__PASSWORD over storing it in a file.
        password: Option<String>,
        database: Option<String>,
        ssl_mode: Option<PgSslMode>,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Statement timeout in milliseconds.
        #[serde(default = "default_statement_timeout_ms")]
        statement_timeout_ms: Option<u64>,
    },
}

fn default_sqlite_busy_timeout_secs() -> u64 {
    5
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

fn default_max_connections() -> u32 {
    10
}

fn default_statement_timeout_ms() -> Option<u64> {
    Some(30_000)
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/chatkeep.db"),
            busy_timeout_secs: default_sqlite_busy_timeout_secs(),
        }
    }
}

impl RecordsConfig {
    /// Validate record store configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            RecordsConfig::Sqlite { .. } => Ok(()),
            RecordsConfig::Postgres {
                url,
                host,
                database,
                ..
            } => match (url.as_ref(), host.as_ref(), database.as_ref()) {
                (Some(_), _, _) => Ok(()),
                (None, Some(_), Some(_)) => Ok(()),
                (None, None, _) => Err(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ),
                (None, Some(_), None) => Err(
                    "postgres config requires 'database' when using individual fields".to_string(),
                ),
            },
        }
    }
}

/// Cache backend selection.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CacheBackendConfig {
    /// In-process cache. Not shared between service instances.
    #[default]
    Memory,
    /// Redis server.
    Redis {
        /// Connection URL, e.g. `redis://127.0.0.1:6379/0`.
        url: String,
    },
}

/// Cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackendConfig,
    /// Time-to-live for every cache key, reset on access and mutation.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    /// Number of recent messages kept per chat.
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_window_capacity() -> usize {
    crate::DEFAULT_WINDOW_CAPACITY
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendConfig::default(),
            ttl_secs: default_cache_ttl_secs(),
            window_capacity: default_window_capacity(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.ttl_secs == 0 {
            return Err("cache.ttl_secs must be greater than 0".to_string());
        }
        if self.window_capacity == 0 {
            return Err("cache.window_capacity must be greater than 0".to_string());
        }
        if let CacheBackendConfig::Redis { url } = &self.backend
            && url.is_empty()
        {
            return Err("cache.backend.url must not be empty".to_string());
        }
        Ok(())
    }
}

/// Blob store backend selection.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlobBackendConfig {
    /// In-process store issuing unsigned URLs under `base_url`.
    Memory {
        #[serde(default = "default_memory_base_url")]
        base_url: String,
    },
    /// S3-compatible storage (AWS, MinIO).
    S3 {
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// Falls back to the ambient AWS credential chain if not set.
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        /// Use path-style URLs. Required for MinIO.
        #[serde(default)]
        force_path_style: bool,
    },
}

fn default_memory_base_url() -> String {
    "memory://avatars".to_string()
}

impl Default for BlobBackendConfig {
    fn default() -> Self {
        Self::Memory {
            base_url: default_memory_base_url(),
        }
    }
}

/// Blob store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlobsConfig {
    #[serde(default)]
    pub backend: BlobBackendConfig,
    /// Validity window of every presigned URL.
    #[serde(default = "default_url_ttl_secs")]
    pub url_ttl_secs: u64,
    /// Key of the object served for chats without an uploaded avatar.
    #[serde(default = "default_avatar")]
    pub default_avatar: String,
    /// Content type stored with uploaded avatars.
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_url_ttl_secs() -> u64 {
    86_400 // 24 hours
}

fn default_avatar() -> String {
    crate::DEFAULT_AVATAR_KEY.to_string()
}

fn default_content_type() -> String {
    crate::AVATAR_CONTENT_TYPE.to_string()
}

impl Default for BlobsConfig {
    fn default() -> Self {
        Self {
            backend: BlobBackendConfig::default(),
            url_ttl_secs: default_url_ttl_secs(),
            default_avatar: default_avatar(),
            content_type: default_content_type(),
        }
    }
}

impl BlobsConfig {
    pub fn url_ttl(&self) -> Duration {
        Duration::from_secs(self.url_ttl_secs)
    }

    /// Validate blob store configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        // S3 rejects presigned URLs valid for longer than 7 days.
        if self.url_ttl_secs == 0 || self.url_ttl_secs > 7 * 86_400 {
            return Err(format!(
                "blobs.url_ttl_secs must be between 1 and {}, got {}",
                7 * 86_400,
                self.url_ttl_secs
            ));
        }
        if self.default_avatar.is_empty() {
            return Err("blobs.default_avatar must not be empty".to_string());
        }
        match &self.backend {
            BlobBackendConfig::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                (Some(_), Some(_)) | (None, None) => Ok(()),
                _ => Err(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ),
            },
            BlobBackendConfig::Memory { .. } => Ok(()),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub records: RecordsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub blobs: BlobsConfig,
}

impl AppConfig {
    /// Validate every section, returning the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        self.service.validate()?;
        self.records.validate()?;
        self.cache.validate()?;
        self.blobs.validate()
    }

    /// Create a test configuration backed by in-process stores.
    ///
    /// **For testing only.** Uses an in-memory SQLite database.
    pub fn for_testing() -> Self {
        Self {
            records: RecordsConfig::Sqlite {
                path: PathBuf::from(":memory:"),
                busy_timeout_secs: default_sqlite_busy_timeout_secs(),
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.window_capacity, 10);
        assert_eq!(config.blobs.default_avatar, "avatar.png");
        assert_eq!(config.service.delete_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_cache_config_deserialize_redis() {
        let json = r#"{"backend":{"type":"redis","url":"redis://localhost:6379"},"ttl_secs":60}"#;
        let config: CacheConfig = serde_json::from_str(json).unwrap();
        match &config.backend {
            CacheBackendConfig::Redis { url } => assert_eq!(url, "redis://localhost:6379"),
            other => panic!("expected redis backend, got {other:?}"),
        }
        assert_eq!(config.ttl_secs, 60);
        assert_eq!(
            config.window_capacity, 10,
            "window_capacity should default when not specified"
        );
    }

    #[test]
    fn test_cache_config_rejects_zero_window() {
        let config = CacheConfig {
            window_capacity: 0,
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blobs_config_s3_validate_partial_credentials() {
        let mut config = BlobsConfig {
            backend: BlobBackendConfig::S3 {
                bucket: "avatars".to_string(),
                endpoint: None,
                region: None,
                prefix: None,
                access_key_id: Some("access-key".to_string()),
                secret_access_key: None,
                force_path_style: false,
            },
            ..BlobsConfig::default()
        };
        assert!(config.validate().is_err());

        if let BlobBackendConfig::S3 {
            secret_access_key, ..
        } = &mut config.backend
        {
            *secret_access_key = Some("secret-key".to_string());
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blobs_config_rejects_url_ttl_over_a_week() {
        let config = BlobsConfig {
            url_ttl_secs: 8 * 86_400,
            ..BlobsConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_s3_force_path_style_defaults_to_false() {
        let json = r#"{"type":"s3","bucket":"test","endpoint":"https://s3.amazonaws.com"}"#;
        let config: BlobBackendConfig = serde_json::from_str(json).unwrap();
        match config {
            BlobBackendConfig::S3 {
                force_path_style, ..
            } => assert!(!force_path_style),
            _ => panic!("expected S3 config"),
        }
    }

    #[test]
    fn test_records_config_postgres_requires_database() {
        let config = RecordsConfig::Postgres {
            url: None,
            host: Some("localhost".to_string()),
            port: Some(5432),
            username: None,
            password: None,
            database: None,
            ssl_mode: None,
            max_connections: 5,
            statement_timeout_ms: None,
        };
        assert!(config.validate().is_err());
    }
}
