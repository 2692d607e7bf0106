//! File record repository: the `files` table.

use async_trait::async_trait;
use harbor_core::{
    AppError, FileRecord, FileRecordStore, StorageBackend, StoredObject, VariantPointers,
};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

const FILE_COLUMNS: &str = r#"
    id, collection_id, original_filename, is_image,
    original_key, original_backend, original_size_bytes, original_content_type,
    thumbnail_key, thumbnail_backend, thumbnail_size_bytes, thumbnail_content_type,
    medium_key, medium_backend, medium_size_bytes, medium_content_type
"#;

/// Row type for the files table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
struct FileRow {
    id: Uuid,
    collection_id: Uuid,
    original_filename: String,
    is_image: bool,
    original_key: String,
    original_backend: StorageBackend,
    original_size_bytes: i64,
    original_content_type: String,
    thumbnail_key: Option<String>,
    thumbnail_backend: Option<StorageBackend>,
    thumbnail_size_bytes: Option<i64>,
    thumbnail_content_type: Option<String>,
    medium_key: Option<String>,
    medium_backend: Option<StorageBackend>,
    medium_size_bytes: Option<i64>,
    medium_content_type: Option<String>,
}

fn optional_object(
    key: Option<String>,
    backend: Option<StorageBackend>,
    size_bytes: Option<i64>,
    content_type: Option<String>,
) -> Option<StoredObject> {
    Some(StoredObject {
        key: key?,
        backend: backend?,
        size_bytes: size_bytes?.max(0) as u64,
        content_type: content_type?,
    })
}

impl FileRow {
    fn into_record(self) -> FileRecord {
        FileRecord {
            id: self.id,
            collection_id: self.collection_id,
            original_filename: self.original_filename,
            is_image: self.is_image,
            original: StoredObject {
                key: self.original_key,
                backend: self.original_backend,
                size_bytes: self.original_size_bytes.max(0) as u64,
                content_type: self.original_content_type,
            },
            thumbnail: optional_object(
                self.thumbnail_key,
                self.thumbnail_backend,
                self.thumbnail_size_bytes,
                self.thumbnail_content_type,
            ),
            medium: optional_object(
                self.medium_key,
                self.medium_backend,
                self.medium_size_bytes,
                self.medium_content_type,
            ),
        }
    }
}

/// Split an optional pointer into bindable columns.
fn columns(
    object: Option<&StoredObject>,
) -> (Option<&str>, Option<StorageBackend>, Option<i64>, Option<&str>) {
    match object {
        Some(o) => (
            Some(o.key.as_str()),
            Some(o.backend),
            Some(o.size_bytes as i64),
            Some(o.content_type.as_str()),
        ),
        None => (None, None, None, None),
    }
}

/// PostgreSQL-backed [`FileRecordStore`].
#[derive(Clone)]
pub struct FileRecordRepository {
    pool: PgPool,
}

impl FileRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Records of one collection, oldest first.
    #[tracing::instrument(skip(self), fields(db.table = "files", collection_id = %collection_id))]
    pub async fn list_by_collection(
        &self,
        collection_id: Uuid,
    ) -> Result<Vec<FileRecord>, AppError> {
        let rows: Vec<FileRow> = sqlx::query_as::<Postgres, FileRow>(&format!(
            "SELECT {} FROM files WHERE collection_id = $1 ORDER BY created_at, id",
            FILE_COLUMNS
        ))
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(FileRow::into_record).collect())
    }
}

#[async_trait]
impl FileRecordStore for FileRecordRepository {
    #[tracing::instrument(skip(self), fields(db.table = "files", db.record_id = %id))]
    async fn get_file_record(&self, id: Uuid) -> Result<Option<FileRecord>, AppError> {
        let row: Option<FileRow> = sqlx::query_as::<Postgres, FileRow>(&format!(
            "SELECT {} FROM files WHERE id = $1",
            FILE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(FileRow::into_record))
    }

    #[tracing::instrument(skip(self, record), fields(db.table = "files", db.record_id = %record.id))]
    async fn insert_file_record(&self, record: &FileRecord) -> Result<(), AppError> {
        let (thumb_key, thumb_backend, thumb_size, thumb_type) = columns(record.thumbnail.as_ref());
        let (medium_key, medium_backend, medium_size, medium_type) = columns(record.medium.as_ref());

        sqlx::query(
            r#"
            INSERT INTO files (
                id, collection_id, original_filename, is_image,
                original_key, original_backend, original_size_bytes, original_content_type,
                thumbnail_key, thumbnail_backend, thumbnail_size_bytes, thumbnail_content_type,
                medium_key, medium_backend, medium_size_bytes, medium_content_type
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(record.id)
        .bind(record.collection_id)
        .bind(&record.original_filename)
        .bind(record.is_image)
        .bind(&record.original.key)
        .bind(record.original.backend)
        .bind(record.original.size_bytes as i64)
        .bind(&record.original.content_type)
        .bind(thumb_key)
        .bind(thumb_backend)
        .bind(thumb_size)
        .bind(thumb_type)
        .bind(medium_key)
        .bind(medium_backend)
        .bind(medium_size)
        .bind(medium_type)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Single statement; a `NULL` parameter keeps the stored column.
    #[tracing::instrument(skip(self, pointers), fields(db.table = "files", db.record_id = %id))]
    async fn update_variant_pointers(
        &self,
        id: Uuid,
        pointers: &VariantPointers,
    ) -> Result<(), AppError> {
        let (thumb_key, thumb_backend, thumb_size, thumb_type) = columns(pointers.thumbnail.as_ref());
        let (medium_key, medium_backend, medium_size, medium_type) = columns(pointers.medium.as_ref());

        let result = sqlx::query(
            r#"
            UPDATE files SET
                thumbnail_key = COALESCE($2, thumbnail_key),
                thumbnail_backend = COALESCE($3, thumbnail_backend),
                thumbnail_size_bytes = COALESCE($4, thumbnail_size_bytes),
                thumbnail_content_type = COALESCE($5, thumbnail_content_type),
                medium_key = COALESCE($6, medium_key),
                medium_backend = COALESCE($7, medium_backend),
                medium_size_bytes = COALESCE($8, medium_size_bytes),
                medium_content_type = COALESCE($9, medium_content_type),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(thumb_key)
        .bind(thumb_backend)
        .bind(thumb_size)
        .bind(thumb_type)
        .bind(medium_key)
        .bind(medium_backend)
        .bind(medium_size)
        .bind(medium_type)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("File {}", id)));
        }
        Ok(())
    }
}
