//! Avatar blob storage for chatkeep.
//!
//! This crate provides:
//! - [`ObjectStore`], a minimal object API with presigned reads
//! - Backends: in-memory and S3-compatible
//! - [`AvatarStore`], which applies the avatar rules (default object,
//!   fixed content type, fixed URL validity window) on top of a backend

pub mod avatars;
pub mod backends;
pub mod error;
pub mod traits;

pub use avatars::{AvatarLink, AvatarStore};
pub use backends::{MemoryBackend, S3Backend};
pub use error::{BlobError, BlobResult};
pub use traits::ObjectStore;

use chatkeep_core::config::{BlobBackendConfig, BlobsConfig};
use std::sync::Arc;

/// Create an object store backend from configuration.
pub async fn backend_from_config(config: &BlobBackendConfig) -> BlobResult<Arc<dyn ObjectStore>> {
    match config {
        BlobBackendConfig::Memory { base_url } => Ok(Arc::new(MemoryBackend::new(base_url))),
        BlobBackendConfig::S3 {
            bucket,
            endpoint,
            region,
            prefix,
            access_key_id,
            secret_access_key,
            force_path_style,
        } => {
            let backend = S3Backend::new(
                bucket,
                endpoint.clone(),
                region.clone(),
                prefix.clone(),
                access_key_id.clone(),
                secret_access_key.clone(),
                *force_path_style,
            )
            .await?;
            Ok(Arc::new(backend))
        }
    }
}

/// Create an avatar store from configuration.
pub async fn from_config(config: &BlobsConfig) -> BlobResult<AvatarStore> {
    config.validate().map_err(BlobError::Config)?;
    let backend = backend_from_config(&config.backend).await?;
    Ok(AvatarStore::new(backend, config))
}
