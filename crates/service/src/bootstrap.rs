//! Configuration loading, tracing setup and backend construction.

use crate::service::ChatService;
use anyhow::{Context, Result, anyhow};
use chatkeep_core::config::{AppConfig, LogFormat};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "CHATKEEP_";

/// Load configuration from an optional TOML file overlaid with
/// `CHATKEEP_`-prefixed environment variables (`__` separates sections, e.g.
/// `CHATKEEP_CACHE__TTL_SECS=60`). A missing file is not an error.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::new();

    match path {
        Some(path) if path.exists() => {
            tracing::info!(config_path = %path.display(), "Loading configuration from file");
            figment = figment.merge(Toml::file(path));
        }
        Some(path) => tracing::debug!("No config file found at {}", path.display()),
        None => {}
    }

    let config: AppConfig = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["config"]))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow!("invalid configuration: {e}"))?;
    Ok(config)
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// `info` filter.
pub fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Plain => registry.with(fmt::layer()).try_init()?,
        LogFormat::Json => registry.with(fmt::layer().json()).try_init()?,
    }
    Ok(())
}

/// Connect every backend named in `config` and assemble the service.
pub async fn build_service(config: &AppConfig) -> Result<ChatService> {
    config
        .validate()
        .map_err(|e| anyhow!("invalid configuration: {e}"))?;

    let records = chatkeep_records::from_config(&config.records)
        .await
        .context("failed to initialize record store")?;
    tracing::info!("Record store initialized");

    let cache = chatkeep_cache::from_config(&config.cache)
        .await
        .context("failed to initialize cache")?;
    tracing::info!("Cache initialized");

    let avatars = chatkeep_blobs::from_config(&config.blobs)
        .await
        .context("failed to initialize avatar store")?;
    avatars
        .health_check()
        .await
        .context("avatar store health check failed")?;
    tracing::info!("Avatar store connectivity verified");

    Ok(ChatService::new(records, cache, avatars)
        .with_delete_timeout(config.service.delete_timeout())
        .with_window_capacity(config.cache.window_capacity))
}
