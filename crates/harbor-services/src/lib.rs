//! Harbor Services Layer
//!
//! The facade route handlers talk to: original upload, variant scheduling and
//! serving resolution. Everything is wired from one `Config` and one injected
//! storage backend; handlers stay thin and only translate `AppError`.

pub mod harbor;
pub mod serving;

pub use harbor::HarborService;
pub use harbor_processing::{MediaValidator, UploadDestination, VariantGenerator};
pub use harbor_storage::{create_storage, Storage, StorageBackend, StorageError};
pub use harbor_worker::BatchSummary;
pub use serving::{FileServingResolver, ServeKind, ServedFile, ServingError, ServingTarget};
