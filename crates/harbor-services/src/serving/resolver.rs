use harbor_core::{Config, FileRecord, FileRecordStore, StoredObject, VariantKind};
use harbor_processing::VariantPipeline;
use harbor_storage::{ServingMode, Storage, StorageError, StorageResult};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::types::{ServeKind, ServedFile, ServingError, ServingTarget};

const DEFAULT_VARIANT_EXPIRY: Duration = Duration::from_secs(2 * 60 * 60);
const DEFAULT_ORIGINAL_EXPIRY: Duration = Duration::from_secs(60 * 60);

/// Resolves "serve kind X of file Y" into a redirect or a byte stream.
///
/// Authorization is decided by the caller before `resolve` is invoked. Clients
/// only ever see presigned URLs or streamed bytes, never storage keys.
///
/// A missing requested variant is generated on demand for that kind only. If
/// that fails the resolver walks thumbnail → medium → original, using a
/// fallback variant only when its pointer is set and its object still exists.
#[derive(Clone)]
pub struct FileServingResolver {
    storage: Arc<dyn Storage>,
    records: Arc<dyn FileRecordStore>,
    pipeline: VariantPipeline,
    variant_expiry: Duration,
    original_expiry: Duration,
}

impl FileServingResolver {
    pub fn new(pipeline: VariantPipeline) -> Self {
        Self {
            storage: Arc::clone(pipeline.storage()),
            records: Arc::clone(pipeline.records()),
            pipeline,
            variant_expiry: DEFAULT_VARIANT_EXPIRY,
            original_expiry: DEFAULT_ORIGINAL_EXPIRY,
        }
    }

    pub fn from_config(pipeline: VariantPipeline, config: &Config) -> Self {
        Self::new(pipeline).with_expiries(
            Duration::from_secs(config.variant_url_expiry_secs),
            Duration::from_secs(config.original_url_expiry_secs),
        )
    }

    pub fn with_expiries(mut self, variant: Duration, original: Duration) -> Self {
        self.variant_expiry = variant;
        self.original_expiry = original;
        self
    }

    #[tracing::instrument(skip(self), fields(file_id = %file_id, requested = %requested))]
    pub async fn resolve(
        &self,
        file_id: Uuid,
        requested: ServeKind,
    ) -> Result<ServedFile, ServingError> {
        let record = self
            .records
            .get_file_record(file_id)
            .await?
            .ok_or(ServingError::FileNotFound(file_id))?;

        let mut last_error = None;
        for &candidate in requested.fallback_chain() {
            let object = if candidate == requested {
                self.requested_object(&record, candidate).await
            } else {
                self.fallback_object(&record, candidate).await
            };
            let Some(object) = object else {
                continue;
            };

            match self.deliver(&object, candidate).await {
                Ok(target) => {
                    let degraded = candidate != requested;
                    if degraded {
                        tracing::info!(served = %candidate, "Serving fallback");
                    }
                    return Ok(ServedFile {
                        target,
                        served: candidate,
                        degraded,
                    });
                }
                Err(e) => {
                    tracing::warn!(candidate = %candidate, error = %e, "Failed to serve candidate");
                    last_error = Some(e.to_string());
                }
            }
        }

        Err(ServingError::Unavailable {
            file_id,
            reason: last_error.unwrap_or_else(|| "no stored object to serve".to_string()),
        })
    }

    /// The requested kind, generating it when the pointer or object is missing.
    async fn requested_object(
        &self,
        record: &FileRecord,
        kind: ServeKind,
    ) -> Option<StoredObject> {
        let Some(variant_kind) = kind.variant_kind() else {
            return Some(record.original.clone());
        };

        if let Some(object) = self.present_variant(record, variant_kind).await {
            return Some(object);
        }

        self.generate_on_demand(record, variant_kind).await
    }

    async fn fallback_object(
        &self,
        record: &FileRecord,
        kind: ServeKind,
    ) -> Option<StoredObject> {
        match kind.variant_kind() {
            Some(variant_kind) => self.present_variant(record, variant_kind).await,
            None => Some(record.original.clone()),
        }
    }

    async fn present_variant(
        &self,
        record: &FileRecord,
        kind: VariantKind,
    ) -> Option<StoredObject> {
        let object = record.variant(kind)?;
        match self.storage.exists(&object.key).await {
            Ok(true) => Some(object.clone()),
            Ok(false) => {
                tracing::warn!(
                    kind = %kind,
                    key = %object.key,
                    "Variant pointer set but object missing"
                );
                None
            }
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Variant existence check failed");
                None
            }
        }
    }

    async fn generate_on_demand(
        &self,
        record: &FileRecord,
        kind: VariantKind,
    ) -> Option<StoredObject> {
        tracing::info!(kind = %kind, "Generating missing variant on demand");
        let outcome = self.pipeline.process_kinds(record, &[kind]).await;
        match outcome.variant(kind) {
            Some(variant) => Some(variant.stored_object.clone()),
            None => {
                tracing::warn!(
                    kind = %kind,
                    stage = ?outcome.stage,
                    "On-demand generation produced nothing"
                );
                None
            }
        }
    }

    async fn deliver(
        &self,
        object: &StoredObject,
        kind: ServeKind,
    ) -> StorageResult<ServingTarget> {
        match self.storage.serving_mode() {
            ServingMode::Redirect => {
                if !self.storage.exists(&object.key).await? {
                    return Err(StorageError::NotFound(object.key.clone()));
                }
                let expiry = match kind {
                    ServeKind::Original => self.original_expiry,
                    _ => self.variant_expiry,
                };
                let access = self.storage.presign(&object.key, expiry).await?;
                Ok(ServingTarget::Redirect {
                    url: access.url,
                    expires_at: access.expires_at,
                })
            }
            ServingMode::Stream => {
                let body = self.storage.get_stream(&object.key).await?;
                Ok(ServingTarget::Stream {
                    body,
                    content_type: object.content_type.clone(),
                    content_length: object.size_bytes,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::TryStreamExt;
    use harbor_core::InMemoryFileRecordStore;
    use harbor_processing::VariantGenerator;
    use harbor_storage::{keys, LocalStorage};
    use std::collections::HashMap;
    use tempfile::TempDir;

    async fn resolver(
        dir: &TempDir,
    ) -> (Arc<LocalStorage>, Arc<InMemoryFileRecordStore>, FileServingResolver) {
        let storage = Arc::new(
            LocalStorage::new(dir.path(), "http://localhost/files".to_string(), "secret")
                .await
                .unwrap(),
        );
        let records = Arc::new(InMemoryFileRecordStore::new());
        let pipeline =
            VariantPipeline::new(storage.clone(), records.clone(), VariantGenerator::default());
        (storage, records, FileServingResolver::new(pipeline))
    }

    async fn stored(
        storage: &LocalStorage,
        records: &InMemoryFileRecordStore,
        data: &'static [u8],
    ) -> FileRecord {
        let collection_id = Uuid::new_v4();
        let original = storage
            .put(
                &keys::original_key(collection_id, "photo.png"),
                Bytes::from_static(data),
                "image/png",
                &HashMap::new(),
            )
            .await
            .unwrap();
        let record = FileRecord::new(collection_id, "photo.png", true, original);
        records.insert_file_record(&record).await.unwrap();
        record
    }

    async fn body(target: ServingTarget) -> Vec<u8> {
        match target {
            ServingTarget::Stream { body, .. } => {
                let chunks: Vec<Bytes> = body.try_collect().await.unwrap();
                chunks.concat()
            }
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let (_, _, resolver) = resolver(&dir).await;

        let err = resolver
            .resolve(Uuid::new_v4(), ServeKind::Thumbnail)
            .await
            .unwrap_err();
        assert!(matches!(err, ServingError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_undecodable_original_degrades_to_original() {
        let dir = TempDir::new().unwrap();
        let (storage, records, resolver) = resolver(&dir).await;
        let record = stored(&storage, &records, b"definitely not a png").await;

        let served = resolver.resolve(record.id, ServeKind::Thumbnail).await.unwrap();

        assert_eq!(served.served, ServeKind::Original);
        assert!(served.degraded);
        assert_eq!(body(served.target).await, b"definitely not a png");
        let saved = records.get_file_record(record.id).await.unwrap().unwrap();
        assert!(saved.thumbnail.is_none());
    }

    #[tokio::test]
    async fn test_fallback_skips_missing_medium_object() {
        let dir = TempDir::new().unwrap();
        let (storage, records, resolver) = resolver(&dir).await;
        let mut record = stored(&storage, &records, b"still not a png").await;

        // Pointer without an object behind it.
        record.medium = Some(StoredObject {
            key: keys::variant_key(&record.original.key, VariantKind::Medium),
            ..record.original.clone()
        });
        records
            .update_variant_pointers(
                record.id,
                &harbor_core::VariantPointers {
                    thumbnail: None,
                    medium: record.medium.clone(),
                },
            )
            .await
            .unwrap();

        let served = resolver.resolve(record.id, ServeKind::Thumbnail).await.unwrap();
        assert_eq!(served.served, ServeKind::Original);
    }

    #[tokio::test]
    async fn test_original_is_served_directly() {
        let dir = TempDir::new().unwrap();
        let (storage, records, resolver) = resolver(&dir).await;
        let record = stored(&storage, &records, b"raw bytes").await;

        let served = resolver.resolve(record.id, ServeKind::Original).await.unwrap();
        assert!(!served.degraded);
        match &served.target {
            ServingTarget::Stream {
                content_type,
                content_length,
                ..
            } => {
                assert_eq!(content_type, "image/png");
                assert_eq!(*content_length, 9);
            }
            other => panic!("expected stream, got {:?}", other),
        }
    }
}
