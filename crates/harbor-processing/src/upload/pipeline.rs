//! Upload intake pipeline.

use bytes::Bytes;
use harbor_core::StoredObject;
use harbor_storage::{keys, Storage};
use std::collections::HashMap;
use std::time::Instant;

use super::types::{UploadDestination, UploadError};
use crate::validator::MediaValidator;

/// Sanitize a client filename for use as the last segment of a storage key.
pub fn sanitize_filename(filename: &str) -> String {
    const MAX: usize = 255;
    let path = std::path::Path::new(filename);
    let base = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);
    if base.contains("..") {
        return "invalid_filename".to_string();
    }
    let s: String = base
        .chars()
        .take(MAX)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if s.trim_matches('_').is_empty() || s.len() < 3 {
        "file".to_string()
    } else {
        s
    }
}

/// Validate and durably store an original upload.
///
/// Validation runs before any storage I/O. Storage failures are fatal to the
/// upload and propagate unchanged; variant generation is never attempted here.
#[tracing::instrument(skip(storage, validator, data), fields(size_bytes = data.len()))]
pub async fn upload_original(
    storage: &dyn Storage,
    validator: &MediaValidator,
    data: Bytes,
    filename: &str,
    destination: &UploadDestination,
) -> Result<StoredObject, UploadError> {
    let start = Instant::now();

    let (_extension, content_type) = validator.validate_all(
        filename,
        destination.declared_content_type.as_deref(),
        data.len(),
    )?;

    let safe_filename = sanitize_filename(filename);
    let key = keys::original_key(destination.collection_id, &safe_filename);

    let mut metadata = HashMap::new();
    metadata.insert(
        "collection_id".to_string(),
        destination.collection_id.to_string(),
    );
    metadata.insert("original_filename".to_string(), safe_filename);

    let stored = storage.put(&key, data, &content_type, &metadata).await?;

    tracing::info!(
        key = %stored.key,
        size_bytes = stored.size_bytes,
        content_type = %stored.content_type,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Original stored"
    );

    Ok(stored)
}
