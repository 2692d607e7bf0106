//! Harbor Core Library
//!
//! Domain models, error types, configuration and the file-record collaborator
//! contract shared by every Harbor crate.

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod storage_types;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    FileRecord, ImageVariant, ObjectSummary, PresignedAccess, StoredObject, VariantKind,
    VariantPointers,
};
pub use repository::{FileRecordStore, InMemoryFileRecordStore};
pub use storage_types::StorageBackend;
