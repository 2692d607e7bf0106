//! Upload intake: validate → sanitize → store the original.
//!
//! Variant generation is not part of intake; the caller schedules it once the
//! file record exists.

mod pipeline;
mod types;

pub use pipeline::{sanitize_filename, upload_original};
pub use types::{UploadDestination, UploadError};
