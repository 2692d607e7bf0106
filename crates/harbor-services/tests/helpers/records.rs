use async_trait::async_trait;
use harbor_core::{AppError, FileRecord, FileRecordStore, InMemoryFileRecordStore, VariantPointers};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// What goes wrong when variant pointers are written.
#[derive(Debug, Clone, Copy)]
pub enum PointerFault {
    /// The database is unreachable.
    Unavailable,
    /// The record was deleted while its variants were being generated.
    Deleted,
}

/// Record store whose reads and inserts work but whose pointer updates fail.
pub struct FaultyRecordStore {
    inner: Arc<InMemoryFileRecordStore>,
    fault: PointerFault,
    updates: AtomicUsize,
}

impl FaultyRecordStore {
    pub fn new(inner: Arc<InMemoryFileRecordStore>, fault: PointerFault) -> Self {
        Self {
            inner,
            fault,
            updates: AtomicUsize::new(0),
        }
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileRecordStore for FaultyRecordStore {
    async fn get_file_record(&self, id: Uuid) -> Result<Option<FileRecord>, AppError> {
        self.inner.get_file_record(id).await
    }

    async fn insert_file_record(&self, record: &FileRecord) -> Result<(), AppError> {
        self.inner.insert_file_record(record).await
    }

    async fn update_variant_pointers(
        &self,
        id: Uuid,
        _pointers: &VariantPointers,
    ) -> Result<(), AppError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        match self.fault {
            PointerFault::Unavailable => Err(AppError::Internal(
                "injected database outage".to_string(),
            )),
            PointerFault::Deleted => Err(AppError::NotFound(format!("File {}", id))),
        }
    }
}
