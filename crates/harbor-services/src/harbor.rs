//! Harbor service facade.
//!
//! Composition root for the variant subsystem: one storage backend, one
//! record store and one config in, the four operations route handlers need out.

use bytes::Bytes;
use harbor_core::{AppError, Config, FileRecord, FileRecordStore, StoredObject};
use harbor_processing::{
    upload_original, MediaValidator, PipelineOutcome, UploadDestination, VariantGenerator,
    VariantPipeline, VariantSettings,
};
use harbor_storage::{create_storage, Storage};
use harbor_worker::{BatchCoordinator, BatchSummary};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::serving::{FileServingResolver, ServeKind, ServedFile};

#[derive(Clone)]
pub struct HarborService {
    storage: Arc<dyn Storage>,
    records: Arc<dyn FileRecordStore>,
    validator: MediaValidator,
    coordinator: BatchCoordinator,
    resolver: FileServingResolver,
}

impl HarborService {
    /// Wire the service around an already-selected storage backend.
    pub fn new(
        config: &Config,
        storage: Arc<dyn Storage>,
        records: Arc<dyn FileRecordStore>,
    ) -> Self {
        let generator = VariantGenerator::new(VariantSettings::from_config(config));
        let pipeline = VariantPipeline::new(Arc::clone(&storage), Arc::clone(&records), generator);

        Self {
            storage,
            records,
            validator: MediaValidator::from_config(config),
            coordinator: BatchCoordinator::new(pipeline.clone(), config.variant_batch_workers),
            resolver: FileServingResolver::from_config(pipeline, config),
        }
    }

    /// Select the storage backend from `config` and wire the service.
    pub async fn from_config(
        config: &Config,
        records: Arc<dyn FileRecordStore>,
    ) -> Result<Self, AppError> {
        let storage = create_storage(config).await?;
        Ok(Self::new(config, storage, records))
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn records(&self) -> &Arc<dyn FileRecordStore> {
        &self.records
    }

    /// Validate and store an original. Never waits on variant generation.
    #[tracing::instrument(skip(self, data, destination), fields(collection_id = %destination.collection_id))]
    pub async fn upload_original(
        &self,
        data: Bytes,
        filename: &str,
        destination: &UploadDestination,
    ) -> Result<StoredObject, AppError> {
        let stored =
            upload_original(self.storage.as_ref(), &self.validator, data, filename, destination)
                .await?;
        Ok(stored)
    }

    /// Store an original and persist its file record, ready for variant
    /// generation.
    pub async fn upload_file(
        &self,
        data: Bytes,
        filename: &str,
        destination: &UploadDestination,
    ) -> Result<FileRecord, AppError> {
        let stored = self.upload_original(data, filename, destination).await?;
        let is_image = stored.content_type.starts_with("image/");
        let record = FileRecord::new(destination.collection_id, filename, is_image, stored);
        self.records.insert_file_record(&record).await?;
        Ok(record)
    }

    /// Generate variants for the given files and wait for the whole batch.
    ///
    /// A record that cannot be loaded is reported as a failed file; the batch
    /// itself never fails.
    #[tracing::instrument(skip(self, file_ids), fields(count = file_ids.len()))]
    pub async fn enqueue_variant_generation(&self, file_ids: &[Uuid]) -> BatchSummary {
        let mut records = Vec::with_capacity(file_ids.len());
        let mut unloadable = Vec::new();

        for &id in file_ids {
            match self.records.get_file_record(id).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {
                    tracing::warn!(file_id = %id, "File record not found");
                    unloadable.push(PipelineOutcome::failed(id, "File record not found"));
                }
                Err(e) => {
                    tracing::error!(file_id = %id, error = %e, "Failed to load file record");
                    unloadable.push(PipelineOutcome::failed(
                        id,
                        format!("Failed to load file record: {}", e),
                    ));
                }
            }
        }

        if unloadable.is_empty() {
            return self.coordinator.process_many(records).await;
        }

        let mut results = self.coordinator.process_many(records).await.results;
        results.extend(unloadable);
        BatchSummary::from_outcomes(results)
    }

    /// Run variant generation in the background so the upload response can
    /// be returned first.
    pub fn spawn_variant_generation(&self, file_ids: Vec<Uuid>) -> JoinHandle<BatchSummary> {
        let service = self.clone();
        tokio::spawn(async move { service.enqueue_variant_generation(&file_ids).await })
    }

    /// Resolve a serving request, degrading to the original when needed.
    pub async fn resolve_serving_url(
        &self,
        file_id: Uuid,
        kind: ServeKind,
    ) -> Result<ServedFile, AppError> {
        Ok(self.resolver.resolve(file_id, kind).await?)
    }
}
