//! Types for the upload intake.

use harbor_core::AppError;
use harbor_storage::StorageError;
use uuid::Uuid;

use crate::validator::ValidationError;

/// Where an original lands.
#[derive(Debug, Clone)]
pub struct UploadDestination {
    pub collection_id: Uuid,
    /// Content-Type sent by the client, checked against the extension.
    pub declared_content_type: Option<String>,
}

impl UploadDestination {
    pub fn collection(collection_id: Uuid) -> Self {
        Self {
            collection_id,
            declared_content_type: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Validation(e) => e.into(),
            UploadError::Storage(e) => e.into(),
        }
    }
}
