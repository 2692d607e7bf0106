#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{RetryPolicy, Storage, StorageBackend, StorageError, StorageResult};
use harbor_core::Config;
use std::sync::Arc;
use std::time::Duration;

/// Create the process-wide storage backend from configuration.
///
/// Called once at startup; the returned handle is injected into every
/// component that touches storage.
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let retry = RetryPolicy::single(Duration::from_millis(config.storage_retry_backoff_ms));

    match config.storage_backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::ObjectStore => {
            let bucket = config
                .s3_bucket
                .clone()
                .ok_or_else(|| StorageError::ConfigError("S3_BUCKET not configured".to_string()))?;
            let endpoint = config.s3_endpoint();

            tracing::info!(
                bucket = %bucket,
                region = %config.s3_region,
                endpoint = endpoint.as_deref().unwrap_or("aws"),
                "Using object store backend"
            );

            let storage = S3Storage::new(bucket, config.s3_region.clone(), endpoint)
                .await?
                .with_max_object_size(config.max_object_size_bytes)
                .with_retry_policy(retry);
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::ObjectStore => Err(StorageError::ConfigError(
            "Object store backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            tracing::info!(
                path = %config.local_storage_path,
                base_url = %config.local_storage_base_url,
                "Using local storage backend"
            );

            let storage = LocalStorage::new(
                config.local_storage_path.clone(),
                config.local_storage_base_url.clone(),
                config.local_url_signing_secret.as_bytes(),
            )
            .await?
            .with_max_object_size(config.max_object_size_bytes)
            .with_retry_policy(retry);
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
