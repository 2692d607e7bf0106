use async_trait::async_trait;
use bytes::Bytes;
use harbor_core::{PresignedAccess, StorageBackend, StoredObject};
use harbor_storage::{ByteStream, ObjectListing, ServingMode, Storage, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Wraps a backend and fails writes to keys containing `fail_puts_matching`.
pub struct FailingStorage {
    inner: Arc<dyn Storage>,
    fail_puts_matching: String,
    pub puts: AtomicUsize,
}

impl FailingStorage {
    pub fn new(inner: Arc<dyn Storage>, fail_puts_matching: impl Into<String>) -> Self {
        Self {
            inner,
            fail_puts_matching: fail_puts_matching.into(),
            puts: AtomicUsize::new(0),
        }
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for FailingStorage {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> StorageResult<StoredObject> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if key.contains(&self.fail_puts_matching) {
            return Err(StorageError::Unavailable(format!(
                "injected write failure for {}",
                key
            )));
        }
        self.inner.put(key, data, content_type, metadata).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        self.inner.get_stream(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        self.inner.delete(key).await
    }

    async fn presign(&self, key: &str, expires_in: Duration) -> StorageResult<PresignedAccess> {
        self.inner.presign(key, expires_in).await
    }

    fn list<'a>(&'a self, prefix: &str, max_keys: usize) -> ObjectListing<'a> {
        self.inner.list(prefix, max_keys)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    fn backend_type(&self) -> StorageBackend {
        self.inner.backend_type()
    }

    fn serving_mode(&self) -> ServingMode {
        self.inner.serving_mode()
    }
}

/// Local storage that prefers redirects, like an object store would.
pub struct RedirectingStorage(pub Arc<dyn Storage>);

#[async_trait]
impl Storage for RedirectingStorage {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> StorageResult<StoredObject> {
        self.0.put(key, data, content_type, metadata).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.0.get(key).await
    }

    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        self.0.get_stream(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        self.0.delete(key).await
    }

    async fn presign(&self, key: &str, expires_in: Duration) -> StorageResult<PresignedAccess> {
        self.0.presign(key, expires_in).await
    }

    fn list<'a>(&'a self, prefix: &str, max_keys: usize) -> ObjectListing<'a> {
        self.0.list(prefix, max_keys)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.0.exists(key).await
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::ObjectStore
    }

    fn serving_mode(&self) -> ServingMode {
        ServingMode::Redirect
    }
}
