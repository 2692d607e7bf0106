//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::Stream;
use harbor_core::models::{ObjectSummary, PresignedAccess, StoredObject};
use harbor_core::AppError;
use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend unreachable, timed out or refused our credentials.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Object of {size} bytes exceeds the storage limit of {limit} bytes")]
    QuotaExceeded { size: u64, limit: u64 },

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    /// Errors worth a second attempt inside `put`/`get`.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unavailable(msg) => AppError::StorageUnavailable(msg),
            StorageError::NotFound(key) => AppError::NotFound(format!("Object not found: {}", key)),
            StorageError::QuotaExceeded { size, limit } => AppError::QuotaExceeded { size, limit },
            StorageError::InvalidKey(msg) | StorageError::InvalidRequest(msg) => {
                AppError::InvalidInput(msg)
            }
            StorageError::IoError(e) => AppError::StorageUnavailable(e.to_string()),
            StorageError::ConfigError(msg) => AppError::StorageUnavailable(msg),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked object body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Lazy prefix listing. Polling drives the backend; a fresh `list` call
/// starts over from the beginning.
pub type ObjectListing<'a> = BoxStream<'a, StorageResult<ObjectSummary>>;

/// How a backend prefers objects to reach clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServingMode {
    /// Hand the client a presigned URL and let it fetch from the backend.
    Redirect,
    /// Stream bytes through the application.
    Stream,
}

/// Storage abstraction trait
///
/// Both backends (local filesystem, S3-compatible object store) implement this
/// trait, so upload, variant and serving code never depends on which one is
/// configured. The backend is picked once at startup by
/// [`create_storage`](crate::create_storage).
#[async_trait]
pub trait Storage: Send + Sync {
    /// Durably store `data` at `key`, overwriting any previous object.
    ///
    /// Transient failures are retried once. Fails with `QuotaExceeded` when
    /// `data` is larger than the backend's object ceiling.
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> StorageResult<StoredObject>;

    /// Read a whole object. `NotFound` if the key is absent.
    ///
    /// Transient failures are retried once.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Read an object as a stream of chunks.
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream>;

    /// Delete an object. Returns `false` when there was nothing to delete.
    async fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Time-limited URL for fetching `key` without application credentials.
    ///
    /// For object stores this is a true presigned URL. The local backend
    /// returns a signed application URL instead; callers may only rely on it
    /// being fetchable for about `expires_in`.
    async fn presign(&self, key: &str, expires_in: Duration) -> StorageResult<PresignedAccess>;

    /// List up to `max_keys` objects whose key starts with `prefix`.
    ///
    /// `max_keys` is honoured as given; no backend applies its own ceiling.
    fn list<'a>(&'a self, prefix: &str, max_keys: usize) -> ObjectListing<'a>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;

    /// Preferred way to hand objects to clients.
    fn serving_mode(&self) -> ServingMode;
}
