use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::StoredObject;

/// Derived renditions produced for every image upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    /// Fixed square crop.
    Thumbnail,
    /// Width-bounded, aspect preserving.
    Medium,
}

impl VariantKind {
    pub const ALL: [VariantKind; 2] = [VariantKind::Thumbnail, VariantKind::Medium];

    /// Filename prefix used in variant storage keys.
    pub fn prefix(&self) -> &'static str {
        match self {
            VariantKind::Thumbnail => "thumb",
            VariantKind::Medium => "medium",
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantKind::Thumbnail => write!(f, "thumbnail"),
            VariantKind::Medium => write!(f, "medium"),
        }
    }
}

impl FromStr for VariantKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "thumbnail" | "thumb" => Ok(VariantKind::Thumbnail),
            "medium" | "preview" => Ok(VariantKind::Medium),
            _ => Err(anyhow::anyhow!("Invalid variant kind: {}", s)),
        }
    }
}

/// A stored, reduced-fidelity rendition of an original image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageVariant {
    pub kind: VariantKind,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub stored_object: StoredObject,
}

/// Variant pointers to write back onto a file record.
///
/// `None` means "leave whatever is stored untouched", never "clear".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantPointers {
    pub thumbnail: Option<StoredObject>,
    pub medium: Option<StoredObject>,
}

impl VariantPointers {
    pub fn set(&mut self, kind: VariantKind, object: StoredObject) {
        match kind {
            VariantKind::Thumbnail => self.thumbnail = Some(object),
            VariantKind::Medium => self.medium = Some(object),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.thumbnail.is_none() && self.medium.is_none()
    }
}

impl FromIterator<ImageVariant> for VariantPointers {
    fn from_iter<I: IntoIterator<Item = ImageVariant>>(iter: I) -> Self {
        let mut pointers = VariantPointers::default();
        for variant in iter {
            pointers.set(variant.kind, variant.stored_object);
        }
        pointers
    }
}
