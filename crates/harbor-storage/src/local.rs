use crate::keys::validate_key;
use crate::retry::{with_retry, RetryPolicy};
use crate::traits::{ByteStream, ObjectListing, ServingMode, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream;
use futures::StreamExt;
use harbor_core::models::{ObjectSummary, PresignedAccess, StoredObject};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_MAX_OBJECT_SIZE: u64 = 5 * 1024 * 1024 * 1024;
const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Local filesystem storage implementation
///
/// `presign` produces an application URL signed with HMAC-SHA256 rather than a
/// backend-enforced URL; the route handler serving it checks the signature
/// with [`LocalStorage::verify_signed_url`].
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
    signing_secret: Vec<u8>,
    max_object_size: u64,
    retry: RetryPolicy,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/harbor/files")
    /// * `base_url` - Base URL the files are served under (e.g., "http://localhost:3000/files")
    /// * `signing_secret` - Key for signing served URLs
    pub async fn new(
        base_path: impl Into<PathBuf>,
        base_url: String,
        signing_secret: impl AsRef<[u8]>,
    ) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
            signing_secret: signing_secret.as_ref().to_vec(),
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

    /// Convert storage key to filesystem path with security validation
    ///
    /// Rejects keys that contain traversal sequences or that resolve outside
    /// the base storage directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        validate_key(storage_key)?;

        let path = self.base_path.join(storage_key);

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        if let Ok(canonical) = path.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    /// Signed URL path for `key`, each segment percent-encoded.
    fn generate_url(&self, key: &str) -> String {
        let encoded: Vec<String> = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.base_url.trim_end_matches('/'), encoded.join("/"))
    }

    fn mac_for(&self, key: &str, expires: i64) -> StorageResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.signing_secret)
            .map_err(|e| StorageError::ConfigError(format!("Invalid signing secret: {}", e)))?;
        mac.update(key.as_bytes());
        mac.update(b":");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    /// Check a signature produced by `presign`.
    ///
    /// `expires` is the unix timestamp from the URL query; expired or forged
    /// signatures both yield `false`.
    pub fn verify_signed_url(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> bool {
        if now.timestamp() > expires {
            return false;
        }
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };
        match self.mac_for(key, expires) {
            Ok(mac) => mac.verify_slice(&signature).is_ok(),
            Err(_) => false,
        }
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn put_once(&self, key: &str, path: &Path, data: &Bytes) -> StorageResult<()> {
        self.ensure_parent_dir(path).await?;

        let mut file = fs::File::create(path).await.map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to create file {}: {}", path.display(), e),
            ))
        })?;

        file.write_all(data).await?;
        file.sync_all().await?;

        tracing::debug!(key = %key, "Local storage write flushed");
        Ok(())
    }

    async fn get_once(&self, key: &str, path: &Path) -> StorageResult<Bytes> {
        match fs::read(path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(StorageError::IoError(e)),
        }
    }

    /// Directory a listing of `prefix` has to start walking from.
    fn listing_root(&self, prefix: &str) -> PathBuf {
        match prefix.rsplit_once('/') {
            Some((dir, _)) if !dir.is_empty() => self.base_path.join(dir),
            _ => self.base_path.clone(),
        }
    }
}

struct ListState {
    base_path: PathBuf,
    prefix: String,
    pending_dirs: Vec<PathBuf>,
    current: Option<fs::ReadDir>,
    remaining: usize,
}

impl ListState {
    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_path).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    /// Advance the walk to the next matching file.
    async fn next_summary(&mut self) -> Option<StorageResult<ObjectSummary>> {
        loop {
            if self.remaining == 0 {
                return None;
            }

            if self.current.is_none() {
                let dir = self.pending_dirs.pop()?;
                match fs::read_dir(&dir).await {
                    Ok(read_dir) => self.current = Some(read_dir),
                    Err(e) if e.kind() == ErrorKind::NotFound => continue,
                    Err(e) => {
                        self.remaining = 0;
                        return Some(Err(StorageError::IoError(e)));
                    }
                }
            }

            let read_dir = self.current.as_mut()?;
            let entry = match read_dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    self.current = None;
                    continue;
                }
                Err(e) => {
                    self.remaining = 0;
                    return Some(Err(StorageError::IoError(e)));
                }
            };

            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    self.remaining = 0;
                    return Some(Err(StorageError::IoError(e)));
                }
            };

            if metadata.is_dir() {
                self.pending_dirs.push(path);
                continue;
            }

            let Some(key) = self.key_for(&path) else {
                continue;
            };
            if !key.starts_with(&self.prefix) {
                continue;
            }

            let last_modified = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            self.remaining -= 1;
            return Some(Ok(ObjectSummary {
                key,
                size: metadata.len(),
                last_modified,
            }));
        }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        _metadata: &HashMap<String, String>,
    ) -> StorageResult<StoredObject> {
        let path = self.key_to_path(key)?;
        let size = data.len() as u64;

        if size > self.max_object_size {
            return Err(StorageError::QuotaExceeded {
                size,
                limit: self.max_object_size,
            });
        }

        let start = std::time::Instant::now();

        with_retry(&self.retry, "put", key, || self.put_once(key, &path, &data)).await?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage put successful"
        );

        Ok(StoredObject {
            key: key.to_string(),
            backend: StorageBackend::Local,
            size_bytes: size,
            content_type: content_type.to_string(),
        })
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        let data = with_retry(&self.retry, "get", key, || self.get_once(key, &path)).await?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage get successful"
        );

        Ok(data)
    }

    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(StorageError::IoError(e)),
        };

        let key = key.to_string();
        let path_display = path.display().to_string();
        let stream = tokio_util::io::ReaderStream::new(file).map(move |item| {
            item.map_err(|e| {
                tracing::error!(
                    error = %e,
                    path = %path_display,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage stream read error"
                );
                StorageError::IoError(e)
            })
        });

        Ok(Box::pin(stream))
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(StorageError::IoError(e)),
        }

        tracing::info!(
            path = %path.display(),
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(true)
    }

    async fn presign(&self, key: &str, expires_in: Duration) -> StorageResult<PresignedAccess> {
        self.key_to_path(key)?;

        if expires_in > MAX_PRESIGN_EXPIRY {
            return Err(StorageError::InvalidRequest(format!(
                "Presigned URL expiry cannot exceed {} seconds",
                MAX_PRESIGN_EXPIRY.as_secs()
            )));
        }

        let expires_at = Utc::now()
            + chrono::Duration::from_std(expires_in)
                .map_err(|e| StorageError::InvalidRequest(e.to_string()))?;
        let expires = expires_at.timestamp();
        let signature = hex::encode(self.mac_for(key, expires)?.finalize().into_bytes());

        Ok(PresignedAccess {
            url: format!(
                "{}?expires={}&signature={}",
                self.generate_url(key),
                expires,
                signature
            ),
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

        let state = ListState {
            base_path: self.base_path.clone(),
            prefix: prefix.to_string(),
            pending_dirs: vec![self.listing_root(prefix)],
            current: None,
            remaining: max_keys,
        };

        stream::unfold(state, |mut state| async move {
            let item = state.next_summary().await?;
            Some((item, state))
        })
        .boxed()
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }

    fn serving_mode(&self) -> ServingMode {
        ServingMode::Stream
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use tempfile::tempdir;

    const SECRET: &str = "test-signing-secret-0123456789abcdef";

    async fn storage(dir: &Path) -> LocalStorage {
        LocalStorage::new(dir, "http://localhost:3000/files".to_string(), SECRET)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_local_storage_put_get() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let data = Bytes::from_static(b"test data");
        let stored = storage
            .put("c1/test.txt", data.clone(), "text/plain", &HashMap::new())
            .await
            .unwrap();

        assert_eq!(stored.key, "c1/test.txt");
        assert_eq!(stored.size_bytes, 9);
        assert_eq!(stored.backend, StorageBackend::Local);

        let downloaded = storage.get("c1/test.txt").await.unwrap();
        assert_eq!(data, downloaded);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        storage
            .put("c1/a.bin", Bytes::from_static(b"first"), "application/octet-stream", &HashMap::new())
            .await
            .unwrap();
        storage
            .put("c1/a.bin", Bytes::from_static(b"second"), "application/octet-stream", &HashMap::new())
            .await
            .unwrap();

        assert_eq!(storage.get("c1/a.bin").await.unwrap(), Bytes::from_static(b"second"));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage.get("c1/missing.jpg").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage.get("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.delete("../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_quota_exceeded() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await.with_max_object_size(4);

        let result = storage
            .put("c1/big.bin", Bytes::from_static(b"12345"), "application/octet-stream", &HashMap::new())
            .await;
        assert!(matches!(
            result,
            Err(StorageError::QuotaExceeded { size: 5, limit: 4 })
        ));
        assert!(!storage.exists("c1/big.bin").await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_surfaces_io_errors() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        storage
            .put("c1/a.txt", Bytes::from_static(b"a"), "text/plain", &HashMap::new())
            .await
            .unwrap();

        assert!(storage.exists("c1/a.txt").await.unwrap());
        assert!(!storage.exists("c1/missing.txt").await.unwrap());
        // A regular file used as a directory is an error, not "absent".
        assert!(matches!(
            storage.exists("c1/a.txt/child").await,
            Err(StorageError::IoError(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_reports_whether_something_was_deleted() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        storage
            .put("c1/a.txt", Bytes::from_static(b"a"), "text/plain", &HashMap::new())
            .await
            .unwrap();

        assert!(storage.delete("c1/a.txt").await.unwrap());
        assert!(!storage.delete("c1/a.txt").await.unwrap());
        assert!(!storage.delete("nonexistent/file.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_stream() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        let data = vec![7u8; 100_000];

        storage
            .put("c1/blob.bin", Bytes::from(data.clone()), "application/octet-stream", &HashMap::new())
            .await
            .unwrap();

        let chunks: Vec<Bytes> = storage
            .get_stream("c1/blob.bin")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let joined: Vec<u8> = chunks.into_iter().flat_map(|c| c.to_vec()).collect();
        assert_eq!(joined, data);

        assert!(matches!(
            storage.get_stream("c1/nope.bin").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_presign_signature_verifies() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let access = storage
            .presign("c1/my photo.jpg", Duration::from_secs(3600))
            .await
            .unwrap();

        assert!(access.url.starts_with("http://localhost:3000/files/c1/my%20photo.jpg?expires="));
        assert_eq!(access.object_key, "c1/my photo.jpg");

        let (_, query) = access.url.split_once('?').unwrap();
        let params: HashMap<&str, &str> = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .collect();
        let expires: i64 = params["expires"].parse().unwrap();
        let signature = params["signature"];

        assert_eq!(expires, access.expires_at.timestamp());
        assert!(storage.verify_signed_url("c1/my photo.jpg", expires, signature, Utc::now()));
        assert!(!storage.verify_signed_url("c1/other.jpg", expires, signature, Utc::now()));

        let later = Utc::now() + chrono::Duration::hours(2);
        assert!(!storage.verify_signed_url("c1/my photo.jpg", expires, signature, later));
    }

    #[tokio::test]
    async fn test_presign_rejects_long_expiry() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage
            .presign("c1/a.jpg", Duration::from_secs(8 * 24 * 60 * 60))
            .await;
        assert!(matches!(result, Err(StorageError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        for key in [
            "c1/a.jpg",
            "c1/b.jpg",
            "c1/variants/thumb_a.jpg",
            "c2/a.jpg",
        ] {
            storage
                .put(key, Bytes::from_static(b"x"), "image/jpeg", &HashMap::new())
                .await
                .unwrap();
        }

        let mut keys: Vec<String> = storage
            .list("c1/", 1000)
            .map_ok(|summary| summary.key)
            .try_collect()
            .await
            .unwrap();
        keys.sort();
        assert_eq!(keys, vec!["c1/a.jpg", "c1/b.jpg", "c1/variants/thumb_a.jpg"]);

        let variants: Vec<ObjectSummary> = storage
            .list("c1/variants/thumb_", 1000)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].size, 1);

        let limited: Vec<ObjectSummary> = storage.list("", 2).try_collect().await.unwrap();
        assert_eq!(limited.len(), 2);

        let none: Vec<ObjectSummary> = storage.list("c9/", 10).try_collect().await.unwrap();
        assert!(none.is_empty());
    }
}
