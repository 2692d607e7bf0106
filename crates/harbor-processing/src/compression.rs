use anyhow::{anyhow, Result};
use bytes::Bytes;
use image::RgbImage;
use std::panic::{catch_unwind, AssertUnwindSafe};

pub const JPEG_MIME_TYPE: &str = "image/jpeg";

/// Encode as a progressive JPEG with mozjpeg's size-optimized Huffman tables.
///
/// Output is deterministic for the same pixels and quality.
pub fn encode_progressive_jpeg(img: &RgbImage, quality: u8) -> Result<Bytes> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(anyhow!("Cannot encode an empty image"));
    }

    // libjpeg reports fatal errors by unwinding.
    let encoded = catch_unwind(AssertUnwindSafe(|| -> Result<Vec<u8>> {
        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(quality.clamp(1, 100) as f32);
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);

        let mut comp = comp.start_compress(Vec::new())?;
        comp.write_scanlines(img.as_raw())?;
        Ok(comp.finish()?)
    }))
    .map_err(|_| anyhow!("JPEG encoder aborted"))??;

    Ok(Bytes::from(encoded))
}
