//! Backend-agnostic references to stored bytes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage_types::StorageBackend;

/// A named, opaque blob at `key` in exactly one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    pub backend: StorageBackend,
    pub size_bytes: u64,
    pub content_type: String,
}

/// Time-boxed capability to fetch one object without going through the app.
///
/// Never persisted; build a fresh one per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignedAccess {
    pub url: String,
    pub expires_at: DateTime<Utc>,
    pub object_key: String,
}

/// One entry yielded by a prefix listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}
