//! Harbor Storage Library
//!
//! Storage abstraction with two interchangeable backends: the local
//! filesystem and S3-compatible object stores (AWS S3, Cloudflare R2, MinIO).
//!
//! # Storage key format
//!
//! - Originals: `{collection_id}/{filename}`
//! - Variants: `{collection_id}/variants/{kind}_{filename}`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in
//! the `keys` module so every backend and the variant pipeline agree on it.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod retry;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use harbor_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use retry::RetryPolicy;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ByteStream, ObjectListing, ServingMode, Storage, StorageError, StorageResult};
