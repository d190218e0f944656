//! Configuration loading and service assembly.

use chatkeep_core::config::{
    AppConfig, BlobBackendConfig, CacheBackendConfig, LogFormat, RecordsConfig,
};
use chatkeep_service::bootstrap::{build_service, init_tracing, load_config};
use figment::Jail;
use std::path::{Path, PathBuf};

const CONFIG_TOML: &str = r#"
[service]
delete_timeout_ms = 250
log_format = "json"

[records]
type = "sqlite"
path = "chat.db"

[cache]
ttl_secs = 120

[cache.backend]
type = "memory"

[blobs]
url_ttl_secs = 600

[blobs.backend]
type = "memory"
base_url = "http://cdn.test/avatars"
"#;

#[test]
fn test_load_config_from_file() {
    Jail::expect_with(|jail| {
        jail.create_file("chatkeep.toml", CONFIG_TOML)?;

        let config = load_config(Some(Path::new("chatkeep.toml"))).map_err(|e| e.to_string())?;
        assert_eq!(config.service.delete_timeout_ms, 250);
        assert_eq!(config.service.log_format, LogFormat::Json);
        assert_eq!(config.cache.ttl_secs, 120);
        assert_eq!(config.cache.window_capacity, 10);
        assert_eq!(config.blobs.url_ttl_secs, 600);
        match &config.records {
            RecordsConfig::Sqlite { path, .. } => assert_eq!(path, &PathBuf::from("chat.db")),
            other => panic!("expected sqlite records, got {other:?}"),
        }
        match &config.blobs.backend {
            BlobBackendConfig::Memory { base_url } => {
                assert_eq!(base_url, "http://cdn.test/avatars")
            }
            other => panic!("expected memory blobs, got {other:?}"),
        }
        Ok(())
    });
}

#[test]
fn test_env_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file("chatkeep.toml", CONFIG_TOML)?;
        jail.set_env("CHATKEEP_SERVICE__DELETE_TIMEOUT_MS", 1000);
        jail.set_env("CHATKEEP_CACHE__WINDOW_CAPACITY", 25);
        jail.set_env("CHATKEEP_CACHE__BACKEND__TYPE", "redis");
        jail.set_env("CHATKEEP_CACHE__BACKEND__URL", "redis://cache:6379/0");

        let config = load_config(Some(Path::new("chatkeep.toml"))).map_err(|e| e.to_string())?;
        assert_eq!(config.service.delete_timeout_ms, 1000);
        assert_eq!(config.cache.window_capacity, 25);
        assert_eq!(config.cache.ttl_secs, 120);
        match &config.cache.backend {
            CacheBackendConfig::Redis { url } => assert_eq!(url, "redis://cache:6379/0"),
            other => panic!("expected redis cache, got {other:?}"),
        }
        Ok(())
    });
}

#[test]
fn test_missing_file_uses_defaults() {
    Jail::expect_with(|_| {
        let config = load_config(Some(Path::new("absent.toml"))).map_err(|e| e.to_string())?;
        assert_eq!(config.service.delete_timeout_ms, 5000);
        assert_eq!(config.blobs.default_avatar, "avatar.png");
        assert!(matches!(config.cache.backend, CacheBackendConfig::Memory));
        Ok(())
    });
}

#[test]
fn test_invalid_values_are_rejected() {
    Jail::expect_with(|jail| {
        jail.set_env("CHATKEEP_CACHE__WINDOW_CAPACITY", 0);
        let err = load_config(None).unwrap_err();
        assert!(err.to_string().contains("window_capacity"), "{err}");
        Ok(())
    });

    Jail::expect_with(|jail| {
        jail.set_env("CHATKEEP_RECORDS__TYPE", "postgres");
        let err = load_config(None).unwrap_err();
        assert!(err.to_string().contains("postgres"), "{err}");
        Ok(())
    });
}

#[test]
fn test_malformed_values_fail_to_load() {
    Jail::expect_with(|jail| {
        jail.set_env("CHATKEEP_SERVICE__LOG_FORMAT", "xml");
        let err = load_config(None).unwrap_err();
        assert!(err.to_string().contains("failed to load configuration"), "{err}");
        Ok(())
    });
}

#[tokio::test]
async fn test_build_service_from_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::for_testing();
    config.records = RecordsConfig::Sqlite {
        path: temp_dir.path().join("nested").join("chat.db"),
        busy_timeout_secs: 5,
    };

    let service = build_service(&config).await.unwrap();
    assert!(service.health_check().await.is_healthy());

    let chat_id = service.create_chat("general", "", None, "u1").await.unwrap();
    assert_eq!(service.get_chat(chat_id).await.unwrap().name, "general");
    assert!(temp_dir.path().join("nested").join("chat.db").exists());
}

#[tokio::test]
async fn test_build_service_rejects_invalid_config() {
    let mut config = AppConfig::for_testing();
    config.service.delete_timeout_ms = 0;
    let err = build_service(&config).await.unwrap_err();
    assert!(err.to_string().contains("delete_timeout_ms"), "{err}");
}

#[test]
fn test_tracing_installs_once() {
    init_tracing(LogFormat::Json).unwrap();
    assert!(init_tracing(LogFormat::Plain).is_err());
}
