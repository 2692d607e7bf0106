//! Per-file variant pipeline.
//!
//! `Pending → DownloadingOriginal → GeneratingVariants → UploadingVariants →
//! Persisted`, ending in `PartiallyFailed` or `Failed` when some or all kinds
//! could not be produced. Nothing here ever touches the original object.

use bytes::Bytes;
use harbor_core::{FileRecord, FileRecordStore, ImageVariant, VariantKind, VariantPointers};
use harbor_storage::{keys, Storage};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::compression::JPEG_MIME_TYPE;
use crate::image::{DecodedImage, RenderedVariant, VariantError, VariantGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Pending,
    DownloadingOriginal,
    GeneratingVariants,
    UploadingVariants,
    Persisted,
    PartiallyFailed,
    Failed,
    /// Not an image, or an extension no variant can be made from.
    Skipped,
}

/// Result of running the pipeline for one file.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub file_id: Uuid,
    pub stage: PipelineStage,
    pub succeeded: Vec<ImageVariant>,
    pub failed: BTreeMap<VariantKind, String>,
    /// File-level failure: original unreadable or persistence failed.
    pub error: Option<String>,
}

impl PipelineOutcome {
    fn new(file_id: Uuid) -> Self {
        Self {
            file_id,
            stage: PipelineStage::Pending,
            succeeded: Vec::new(),
            failed: BTreeMap::new(),
            error: None,
        }
    }

    /// Outcome for a file the pipeline could not run for at all.
    pub fn failed(file_id: Uuid, error: impl Into<String>) -> Self {
        Self {
            stage: PipelineStage::Failed,
            error: Some(error.into()),
            ..Self::new(file_id)
        }
    }

    pub fn succeeded_kinds(&self) -> Vec<VariantKind> {
        self.succeeded.iter().map(|v| v.kind).collect()
    }

    pub fn is_success(&self) -> bool {
        matches!(self.stage, PipelineStage::Persisted | PipelineStage::Skipped)
    }

    pub fn is_skipped(&self) -> bool {
        self.stage == PipelineStage::Skipped
    }

    pub fn variant(&self, kind: VariantKind) -> Option<&ImageVariant> {
        self.succeeded.iter().find(|v| v.kind == kind)
    }

    fn finish(mut self) -> Self {
        self.stage = if self.error.is_some() || self.succeeded.is_empty() {
            PipelineStage::Failed
        } else if self.failed.is_empty() {
            PipelineStage::Persisted
        } else {
            PipelineStage::PartiallyFailed
        };
        self
    }
}

/// Runs variant generation for a single file against injected storage and
/// record persistence.
#[derive(Clone)]
pub struct VariantPipeline {
    storage: Arc<dyn Storage>,
    records: Arc<dyn FileRecordStore>,
    generator: Arc<VariantGenerator>,
}

impl VariantPipeline {
    pub fn new(
        storage: Arc<dyn Storage>,
        records: Arc<dyn FileRecordStore>,
        generator: VariantGenerator,
    ) -> Self {
        Self {
            storage,
            records,
            generator: Arc::new(generator),
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn records(&self) -> &Arc<dyn FileRecordStore> {
        &self.records
    }

    /// Generate and persist every variant kind.
    pub async fn process_one(&self, record: &FileRecord) -> PipelineOutcome {
        self.process_kinds(record, &VariantKind::ALL).await
    }

    /// Generate and persist only `kinds`. Never returns an error: every
    /// failure is recorded on the outcome.
    #[tracing::instrument(skip(self, record), fields(file_id = %record.id, key = %record.original.key))]
    pub async fn process_kinds(
        &self,
        record: &FileRecord,
        kinds: &[VariantKind],
    ) -> PipelineOutcome {
        let start = Instant::now();
        let mut outcome = PipelineOutcome::new(record.id);

        let extension = match record.extension() {
            Some(ext) if record.is_image && VariantGenerator::is_supported_extension(&ext) => ext,
            _ => {
                tracing::debug!(
                    filename = %record.original_filename,
                    is_image = record.is_image,
                    "Skipping variant generation"
                );
                outcome.stage = PipelineStage::Skipped;
                return outcome;
            }
        };

        outcome.stage = PipelineStage::DownloadingOriginal;
        let original = match self.storage.get(&record.original.key).await {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(error = %e, "Failed to download original");
                outcome.error = Some(format!("Failed to download original: {}", e));
                return outcome.finish();
            }
        };

        outcome.stage = PipelineStage::GeneratingVariants;
        let decoded = match self.decode(original, extension).await {
            Ok(decoded) => Arc::new(decoded),
            Err(e) => {
                tracing::warn!(error = %e, "Original could not be decoded");
                for kind in kinds {
                    outcome.failed.insert(*kind, e.to_string());
                }
                return outcome.finish();
            }
        };

        let mut rendered = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            match self.render(Arc::clone(&decoded), kind).await {
                Ok(variant) => rendered.push(variant),
                Err(e) => {
                    tracing::warn!(kind = %kind, error = %e, "Variant generation failed");
                    outcome.failed.insert(kind, e.to_string());
                }
            }
        }

        outcome.stage = PipelineStage::UploadingVariants;
        for variant in rendered {
            let kind = variant.kind;
            match self.upload(record, variant).await {
                Ok(stored) => outcome.succeeded.push(stored),
                Err(e) => {
                    tracing::warn!(kind = %kind, error = %e, "Variant upload failed");
                    outcome.failed.insert(kind, e.to_string());
                }
            }
        }

        if !outcome.succeeded.is_empty() {
            let pointers: VariantPointers = outcome.succeeded.iter().cloned().collect();
            if let Err(e) = self.records.update_variant_pointers(record.id, &pointers).await {
                tracing::error!(error = %e, "Failed to persist variant pointers");
                outcome.error = Some(format!("Failed to persist variant pointers: {}", e));
            }
        }

        let outcome = outcome.finish();
        tracing::info!(
            stage = ?outcome.stage,
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Variant pipeline finished"
        );
        outcome
    }

    async fn decode(&self, data: Bytes, extension: String) -> Result<DecodedImage, VariantError> {
        let generator = Arc::clone(&self.generator);
        tokio::task::spawn_blocking(move || generator.decode(&data, &extension))
            .await
            .map_err(|e| VariantError::Processing(format!("Decode task failed: {}", e)))?
    }

    async fn render(
        &self,
        decoded: Arc<DecodedImage>,
        kind: VariantKind,
    ) -> Result<RenderedVariant, VariantError> {
        let generator = Arc::clone(&self.generator);
        tokio::task::spawn_blocking(move || generator.render(&decoded, kind))
            .await
            .map_err(|e| VariantError::Processing(format!("Render task failed: {}", e)))?
    }

    async fn upload(
        &self,
        record: &FileRecord,
        variant: RenderedVariant,
    ) -> Result<ImageVariant, harbor_storage::StorageError> {
        let key = keys::variant_key(&record.original.key, variant.kind);

        let mut metadata = HashMap::new();
        metadata.insert("collection_id".to_string(), record.collection_id.to_string());
        metadata.insert("variant_kind".to_string(), variant.kind.to_string());
        metadata.insert("source_key".to_string(), record.original.key.clone());

        let stored_object = self
            .storage
            .put(&key, variant.bytes, JPEG_MIME_TYPE, &metadata)
            .await?;

        Ok(ImageVariant {
            kind: variant.kind,
            width: variant.width,
            height: variant.height,
            quality: variant.quality,
            stored_object,
        })
    }
}
