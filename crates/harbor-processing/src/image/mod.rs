//! Image variant generation
//!
//! - orientation: EXIF orientation lookup and the matching rotate/flip
//! - resize: pure dimension math for each variant kind
//! - generator: the decode → normalize → orient → resize → sharpen → encode chain

pub mod generator;
pub mod orientation;
pub mod resize;

pub use generator::{
    DecodedImage, RenderedVariant, VariantError, VariantGenerator, VariantSettings,
};
pub use orientation::ImageOrientation;
pub use resize::{medium_dimensions, thumbnail_plan, ThumbnailPlan};
