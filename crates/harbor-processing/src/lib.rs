//! Harbor Processing Library
//!
//! Everything that turns uploaded bytes into stored objects:
//! - upload intake (validation, filename sanitization, storing the original)
//! - variant generation (decode, normalize, orient, resize, sharpen, encode)
//! - the per-file variant pipeline that ties generation to storage and the
//!   file record store

pub mod compression;
pub mod image;
pub mod pipeline;
pub mod upload;
pub mod validator;

pub use crate::image::{
    DecodedImage, RenderedVariant, VariantError, VariantGenerator, VariantSettings,
};
pub use pipeline::{PipelineOutcome, PipelineStage, VariantPipeline};
pub use upload::{upload_original, UploadDestination, UploadError};
pub use validator::{MediaValidator, ValidationError};
