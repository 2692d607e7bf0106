use crate::keys::validate_key;
use crate::retry::{with_retry, RetryPolicy};
use crate::traits::{ByteStream, ObjectListing, ServingMode, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::{stream, StreamExt};
use harbor_core::models::{ObjectSummary, PresignedAccess, StoredObject};
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectStoreExt, PutOptions, PutPayload,
    Result as ObjectResult,
};
use std::collections::HashMap;
use std::time::Duration;

/// Object stores cap single-request uploads at 5 GiB.
const DEFAULT_MAX_OBJECT_SIZE: u64 = 5 * 1024 * 1024 * 1024;
const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Lifetime of the internal URL `get` reads through.
const INTERNAL_GET_EXPIRY: Duration = Duration::from_secs(300);

fn map_object_store_error(key: &str, err: ObjectStoreError) -> StorageError {
    match err {
        ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
        other => StorageError::Unavailable(other.to_string()),
    }
}

/// Directory to list for `prefix`. object_store lists whole path segments,
/// so a partial last segment (`c1/variants/thumb_`) lists its parent.
fn list_location(prefix: &str) -> Option<Path> {
    match prefix.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => Some(Path::from(dir)),
        _ => None,
    }
}

fn matches_prefix(location: &Path, prefix: &str) -> bool {
    location.as_ref().starts_with(prefix)
}

/// S3-compatible storage implementation (AWS S3, Cloudflare R2, MinIO)
///
/// Reads go through a short-lived presigned GET so the HTTP client fetching
/// bytes never holds the store's credentials.
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    http: reqwest::Client,
    bucket: String,
    max_object_size: u64,
    retry: RetryPolicy,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - Bucket name
    /// * `region` - Region identifier (`auto` for R2)
    /// * `endpoint_url` - Optional custom endpoint for S3-compatible providers
    ///   (e.g., "https://<account>.r2.cloudflarestorage.com", "http://localhost:9000" for MinIO)
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        // Credentials come from the standard AWS_* environment variables.
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage {
            store,
            http,
            bucket,
            max_object_size: DEFAULT_MAX_OBJECT_SIZE,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_max_object_size(mut self, bytes: u64) -> Self {
        self.max_object_size = bytes;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }


    async fn signed_get_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let location = Path::from(key.to_string());
        let url_result: ObjectResult<_> = self
            .store
            .signed_url(Method::GET, &location, expires_in)
            .await;

        Ok(url_result
            .map_err(|e| StorageError::Unavailable(e.to_string()))?
            .to_string())
    }

    /// Issue a GET against a fresh internal presigned URL.
    async fn fetch(&self, key: &str) -> StorageResult<reqwest::Response> {
        let url = self.signed_get_url(key, INTERNAL_GET_EXPIRY).await?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(response),
            reqwest::StatusCode::NOT_FOUND => Err(StorageError::NotFound(key.to_string())),
            status => Err(StorageError::Unavailable(format!(
                "Object store returned {} for {}",
                status, key
            ))),
        }
    }

    async fn put_once(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> StorageResult<()> {
        let location = Path::from(key.to_string());

        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::ContentType,
            AttributeValue::from(content_type.to_string()),
        );
        for (name, value) in metadata {
            attributes.insert(
                Attribute::Metadata(name.clone().into()),
                AttributeValue::from(value.clone()),
            );
        }

        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        let result: ObjectResult<_> =
            object_store::ObjectStore::put_opts(&self.store, &location, PutPayload::from(data), options)
                .await;

        result.map(|_| ()).map_err(|e| map_object_store_error(key, e))
    }

    async fn get_once(&self, key: &str) -> StorageResult<Bytes> {
        self.fetch(key)
            .await?
            .bytes()
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> StorageResult<StoredObject> {
        validate_key(key)?;
        let size = data.len() as u64;

        if size > self.max_object_size {
            return Err(StorageError::QuotaExceeded {
                size,
                limit: self.max_object_size,
            });
        }

        let start = std::time::Instant::now();

        with_retry(&self.retry, "put", key, || {
            self.put_once(key, data.clone(), content_type, metadata)
        })
        .await
        .map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 put failed"
            );
            e
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 put successful"
        );

        Ok(StoredObject {
            key: key.to_string(),
            backend: StorageBackend::ObjectStore,
            size_bytes: size,
            content_type: content_type.to_string(),
        })
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        validate_key(key)?;
        let start = std::time::Instant::now();

        let bytes = with_retry(&self.retry, "get", key, || self.get_once(key))
            .await
            .map_err(|e| {
                if !matches!(e, StorageError::NotFound(_)) {
                    tracing::error!(
                        error = %e,
                        bucket = %self.bucket,
                        key = %key,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "S3 get failed"
                    );
                }
                e
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 get successful"
        );

        Ok(bytes)
    }

    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        validate_key(key)?;
        let start = std::time::Instant::now();
        let response = self.fetch(key).await?;

        let bucket = self.bucket.clone();
        let key = key.to_string();
        let stream = response.bytes_stream().map(move |res| {
            res.map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 stream read error"
                );
                StorageError::Unavailable(e.to_string())
            })
        });

        Ok(Box::pin(stream))
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        let start = std::time::Instant::now();

        // S3 deletes succeed on missing keys, so check first to report it.
        if !self.exists(key).await? {
            return Ok(false);
        }

        let location = Path::from(key.to_string());
        let result: ObjectResult<_> = self.store.delete(&location).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 delete failed"
            );
            map_object_store_error(key, e)
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(true)
    }

    async fn presign(&self, key: &str, expires_in: Duration) -> StorageResult<PresignedAccess> {
        validate_key(key)?;

        if expires_in > MAX_PRESIGN_EXPIRY {
            return Err(StorageError::InvalidRequest(format!(
                "Presigned URL expiry cannot exceed {} seconds",
                MAX_PRESIGN_EXPIRY.as_secs()
            )));
        }

        let expires_at = Utc::now()
            + chrono::Duration::from_std(expires_in)
                .map_err(|e| StorageError::InvalidRequest(e.to_string()))?;
        let url = self.signed_get_url(key, expires_in).await?;

        Ok(PresignedAccess {
            url,
            expires_at,
            object_key: key.to_string(),
        })
    }

    fn list<'a>(&'a self, prefix: &str, max_keys: usize) -> ObjectListing<'a> {
        if !prefix.is_empty() {
            if let Err(e) = validate_key(prefix) {
                return stream::once(async move { Err(e) }).boxed();
            }
        }

        let location = list_location(prefix);
        let prefix = prefix.to_string();
        let listed_prefix = prefix.clone();

        object_store::ObjectStore::list(&self.store, location.as_ref())
            .filter(move |item| {
                let keep = match item {
                    Ok(meta) => matches_prefix(&meta.location, &prefix),
                    Err(_) => true,
                };
                futures::future::ready(keep)
            })
            .take(max_keys)
            .map(move |item| {
                item.map(|meta| ObjectSummary {
                    key: meta.location.to_string(),
                    size: meta.size as u64,
                    last_modified: meta.last_modified,
                })
                .map_err(|e| map_object_store_error(&listed_prefix, e))
            })
            .boxed()
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        let location = Path::from(key.to_string());
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::Unavailable(e.to_string())),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::ObjectStore
    }

    fn serving_mode(&self) -> ServingMode {
        ServingMode::Redirect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    async fn storage() -> S3Storage {
        S3Storage::new(
            "harbor-test".to_string(),
            "auto".to_string(),
            Some("http://localhost:9000".to_string()),
        )
        .await
        .unwrap()
    }

    #[test]
    fn test_list_location_uses_enclosing_directory() {
        assert_eq!(list_location("c1/variants/thumb_"), Some(Path::from("c1/variants")));
        assert_eq!(list_location("c1/"), Some(Path::from("c1")));
        assert_eq!(list_location("c1"), None);
        assert_eq!(list_location(""), None);
    }

    #[test]
    fn test_partial_segment_prefix_filter() {
        let thumb = Path::from("c1/variants/thumb_a.png");
        let medium = Path::from("c1/variants/medium_a.png");
        assert!(matches_prefix(&thumb, "c1/variants/thumb_"));
        assert!(!matches_prefix(&medium, "c1/variants/thumb_"));
        assert!(matches_prefix(&medium, "c1/"));
        assert!(!matches_prefix(&Path::from("c10/a.png"), "c1/"));
    }

    #[test]
    fn test_error_mapping() {
        let missing = ObjectStoreError::NotFound {
            path: "c1/a.png".to_string(),
            source: "no such key".into(),
        };
        assert!(matches!(
            map_object_store_error("c1/a.png", missing),
            StorageError::NotFound(key) if key == "c1/a.png"
        ));

        let outage = ObjectStoreError::Generic {
            store: "S3",
            source: "connection reset".into(),
        };
        assert!(matches!(
            map_object_store_error("c1/a.png", outage),
            StorageError::Unavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_rejects_before_any_request() {
        let storage = storage().await.with_max_object_size(4);

        let err = storage
            .put("c1/a.bin", Bytes::from_static(b"12345"), "image/png", &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { size: 5, limit: 4 }));

        let err = storage
            .presign("c1/a.bin", MAX_PRESIGN_EXPIRY + Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidRequest(_)));

        let err = storage.list("../c1/", 10).try_collect::<Vec<_>>().await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_reports_object_store_backend() {
        let storage = storage().await;
        assert_eq!(storage.backend_type(), StorageBackend::ObjectStore);
        assert_eq!(storage.serving_mode(), ServingMode::Redirect);
    }
}
