use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{StoredObject, VariantKind, VariantPointers};

/// One uploaded file, as seen by the variant pipeline and the serving layer.
///
/// Created by the upload flow once the original bytes are stored. Only the
/// variant pointers are ever mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub collection_id: Uuid,
    pub original_filename: String,
    pub is_image: bool,
    pub original: StoredObject,
    pub thumbnail: Option<StoredObject>,
    pub medium: Option<StoredObject>,
}

impl FileRecord {
    pub fn new(
        collection_id: Uuid,
        original_filename: impl Into<String>,
        is_image: bool,
        original: StoredObject,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            collection_id,
            original_filename: original_filename.into(),
            is_image,
            original,
            thumbnail: None,
            medium: None,
        }
    }

    /// Lowercased extension of the original filename, if any.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.original_filename.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }

    pub fn variant(&self, kind: VariantKind) -> Option<&StoredObject> {
        match kind {
            VariantKind::Thumbnail => self.thumbnail.as_ref(),
            VariantKind::Medium => self.medium.as_ref(),
        }
    }

    /// Overwrite the pointers present in `pointers`, keep the rest.
    pub fn apply_pointers(&mut self, pointers: &VariantPointers) {
        if let Some(thumbnail) = &pointers.thumbnail {
            self.thumbnail = Some(thumbnail.clone());
        }
        if let Some(medium) = &pointers.medium {
            self.medium = Some(medium.clone());
        }
    }
}
