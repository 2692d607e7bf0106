//! File record persistence contract.
//!
//! The record store belongs to the surrounding application; the variant
//! pipeline and the serving layer only read records and write variant
//! pointers back through this trait.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{FileRecord, VariantPointers};

#[async_trait]
pub trait FileRecordStore: Send + Sync {
    /// Fetch one record. `Ok(None)` when the id is unknown.
    async fn get_file_record(&self, id: Uuid) -> Result<Option<FileRecord>, AppError>;

    async fn insert_file_record(&self, record: &FileRecord) -> Result<(), AppError>;

    /// Write the pointers present in `pointers` as one atomic update.
    ///
    /// Kinds left as `None` keep whatever the record already has.
    /// Returns `NotFound` if the record no longer exists.
    async fn update_variant_pointers(
        &self,
        id: Uuid,
        pointers: &VariantPointers,
    ) -> Result<(), AppError>;
}

/// Process-local record store.
#[derive(Default)]
pub struct InMemoryFileRecordStore {
    records: RwLock<HashMap<Uuid, FileRecord>>,
}

impl InMemoryFileRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> AppError {
    AppError::Internal("file record store lock poisoned".to_string())
}

#[async_trait]
impl FileRecordStore for InMemoryFileRecordStore {
    async fn get_file_record(&self, id: Uuid) -> Result<Option<FileRecord>, AppError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(&id).cloned())
    }

    async fn insert_file_record(&self, record: &FileRecord) -> Result<(), AppError> {
        let mut records = self.records.write().map_err(poisoned)?;
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn update_variant_pointers(
        &self,
        id: Uuid,
        pointers: &VariantPointers,
    ) -> Result<(), AppError> {
        let mut records = self.records.write().map_err(poisoned)?;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("File record {} not found", id)))?;
        record.apply_pointers(pointers);

        tracing::debug!(
            file_id = %id,
            thumbnail = pointers.thumbnail.is_some(),
            medium = pointers.medium.is_some(),
            "Variant pointers updated"
        );

        Ok(())
    }
}
