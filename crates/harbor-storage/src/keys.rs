//! Shared key generation for storage backends.
//!
//! Originals live at `{collection_id}/{filename}`; variants sit next to them
//! under `variants/` with a kind prefix. The same original key and kind always
//! map to the same variant key, so regeneration overwrites in place and orphans
//! can be found by prefix listing.

use harbor_core::VariantKind;
use uuid::Uuid;

use crate::traits::{StorageError, StorageResult};

pub const VARIANTS_DIR: &str = "variants";

/// Reject keys that could escape a backend's namespace.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.contains("..") || key.starts_with('/') || key.contains('\\') || key.contains('\0') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

/// Key for an original upload. `filename` must already be sanitized.
pub fn original_key(collection_id: Uuid, filename: &str) -> String {
    format!("{}/{}", collection_id, filename)
}

/// Prefix under which every object of a collection lives.
pub fn collection_prefix(collection_id: Uuid) -> String {
    format!("{}/", collection_id)
}

/// Deterministic variant key for an original key.
///
/// `c/photo.png` becomes `c/variants/thumb_photo.png`. The filename is kept
/// verbatim so distinct originals never share a variant key; the stored
/// content type, not the name, says the variant is JPEG.
pub fn variant_key(original_key: &str, kind: VariantKind) -> String {
    match original_key.rsplit_once('/') {
        Some((dir, filename)) => {
            format!("{}/{}/{}_{}", dir, VARIANTS_DIR, kind.prefix(), filename)
        }
        None => format!("{}/{}_{}", VARIANTS_DIR, kind.prefix(), original_key),
    }
}
