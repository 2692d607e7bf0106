//! Variant generator: original bytes in, JPEG variant bytes out. No I/O.

use bytes::Bytes;
use harbor_core::{AppError, Config, VariantKind};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageError, ImageFormat, ImageReader, Rgb, RgbImage};
use std::io::Cursor;

use super::orientation::ImageOrientation;
use super::resize::{medium_dimensions, thumbnail_plan};
use crate::compression::encode_progressive_jpeg;

/// Extensions variants can be generated for.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "tiff", "tif", "bmp"];

const SHARPEN_SIGMA: f32 = 0.5;
const SHARPEN_THRESHOLD: i32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum VariantError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Image processing failed: {0}")]
    Processing(String),
}

impl From<VariantError> for AppError {
    fn from(err: VariantError) -> Self {
        match err {
            VariantError::UnsupportedFormat(msg) => AppError::UnsupportedFormat(msg),
            VariantError::Processing(msg) => AppError::ImageProcessing(msg),
        }
    }
}

/// Geometry and encoder settings for both variant kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantSettings {
    pub thumbnail_size: u32,
    pub medium_max_width: u32,
    pub thumbnail_quality: u8,
    pub medium_quality: u8,
    pub sharpen: bool,
}

impl Default for VariantSettings {
    fn default() -> Self {
        Self {
            thumbnail_size: 200,
            medium_max_width: 1200,
            thumbnail_quality: 75,
            medium_quality: 85,
            sharpen: true,
        }
    }
}

impl VariantSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            thumbnail_size: config.thumbnail_size,
            medium_max_width: config.medium_max_width,
            thumbnail_quality: config.thumbnail_quality,
            medium_quality: config.medium_quality,
            sharpen: config.variant_sharpen,
        }
    }

    pub fn quality_for(&self, kind: VariantKind) -> u8 {
        match kind {
            VariantKind::Thumbnail => self.thumbnail_quality,
            VariantKind::Medium => self.medium_quality,
        }
    }
}

/// An original decoded, flattened to RGB and turned upright.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pixels: RgbImage,
    source_format: ImageFormat,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn source_format(&self) -> ImageFormat {
        self.source_format
    }
}

/// Encoded variant ready to store.
#[derive(Debug, Clone)]
pub struct RenderedVariant {
    pub kind: VariantKind,
    pub bytes: Bytes,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

#[derive(Debug, Clone, Default)]
pub struct VariantGenerator {
    settings: VariantSettings,
}

impl VariantGenerator {
    pub fn new(settings: VariantSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &VariantSettings {
        &self.settings
    }

    pub fn is_supported_extension(extension: &str) -> bool {
        let extension = extension.trim_start_matches('.').to_lowercase();
        SUPPORTED_EXTENSIONS.contains(&extension.as_str())
    }

    fn format_for_extension(extension: &str) -> Option<ImageFormat> {
        match extension.trim_start_matches('.').to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "webp" => Some(ImageFormat::WebP),
            "tif" | "tiff" => Some(ImageFormat::Tiff),
            "bmp" => Some(ImageFormat::Bmp),
            _ => None,
        }
    }

    /// Generate one variant from original bytes.
    pub fn generate(
        &self,
        data: &[u8],
        extension: &str,
        kind: VariantKind,
    ) -> Result<RenderedVariant, VariantError> {
        let decoded = self.decode(data, extension)?;
        self.render(&decoded, kind)
    }

    /// Decode, flatten to RGB and apply EXIF orientation.
    pub fn decode(&self, data: &[u8], extension: &str) -> Result<DecodedImage, VariantError> {
        let declared = Self::format_for_extension(extension).ok_or_else(|| {
            VariantError::UnsupportedFormat(format!("extension '{}' is not supported", extension))
        })?;

        let mut reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| VariantError::Processing(e.to_string()))?;

        let source_format = match reader.format() {
            Some(format) if Self::is_supported_format(format) => format,
            Some(format) => {
                return Err(VariantError::UnsupportedFormat(format!(
                    "{:?} images are not supported",
                    format
                )))
            }
            None => {
                reader.set_format(declared);
                declared
            }
        };

        let img = reader.decode().map_err(|e| match e {
            ImageError::Unsupported(inner) => VariantError::UnsupportedFormat(inner.to_string()),
            other => VariantError::Processing(other.to_string()),
        })?;

        let orientation = ImageOrientation::read_exif_orientation(data);
        let pixels = ImageOrientation::apply(Self::flatten(img), orientation);

        tracing::debug!(
            format = ?source_format,
            width = pixels.width(),
            height = pixels.height(),
            orientation = orientation,
            "Decoded original"
        );

        Ok(DecodedImage {
            pixels,
            source_format,
        })
    }

    fn is_supported_format(format: ImageFormat) -> bool {
        matches!(
            format,
            ImageFormat::Jpeg
                | ImageFormat::Png
                | ImageFormat::WebP
                | ImageFormat::Tiff
                | ImageFormat::Bmp
        )
    }

    /// Flatten to 8-bit RGB, compositing any alpha onto white.
    fn flatten(img: DynamicImage) -> RgbImage {
        if !img.color().has_alpha() {
            return img.to_rgb8();
        }

        let rgba = img.to_rgba8();
        RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let [r, g, b, a] = rgba.get_pixel(x, y).0;
            let alpha = a as u32;
            let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
            Rgb([blend(r), blend(g), blend(b)])
        })
    }

    /// Resize, sharpen and encode one kind.
    pub fn render(
        &self,
        image: &DecodedImage,
        kind: VariantKind,
    ) -> Result<RenderedVariant, VariantError> {
        let source = &image.pixels;
        let (width, height) = source.dimensions();

        let resized = match kind {
            VariantKind::Thumbnail => {
                let plan = thumbnail_plan(width, height, self.settings.thumbnail_size);
                match plan.crop {
                    Some((x, y, side)) => {
                        let cropped = imageops::crop_imm(source, x, y, side, side).to_image();
                        Self::resize_to(cropped, plan.width, plan.height)
                    }
                    None => Self::resize_to(source.clone(), plan.width, plan.height),
                }
            }
            VariantKind::Medium => {
                let (w, h) = medium_dimensions(width, height, self.settings.medium_max_width);
                Self::resize_to(source.clone(), w, h)
            }
        };

        let finished = if self.settings.sharpen {
            imageops::unsharpen(&resized, SHARPEN_SIGMA, SHARPEN_THRESHOLD)
        } else {
            resized
        };

        let quality = self.settings.quality_for(kind);
        let bytes = encode_progressive_jpeg(&finished, quality)
            .map_err(|e| VariantError::Processing(e.to_string()))?;

        tracing::debug!(
            kind = %kind,
            source_width = width,
            source_height = height,
            width = finished.width(),
            height = finished.height(),
            quality = quality,
            size_bytes = bytes.len(),
            "Rendered variant"
        );

        Ok(RenderedVariant {
            kind,
            bytes,
            width: finished.width(),
            height: finished.height(),
            quality,
        })
    }

    fn resize_to(img: RgbImage, width: u32, height: u32) -> RgbImage {
        if img.dimensions() == (width, height) {
            img
        } else {
            imageops::resize(&img, width, height, FilterType::Lanczos3)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), format).unwrap();
        buffer
    }

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn test_medium_round_trip_keeps_aspect_ratio() {
        let data = encode(gradient(3000, 2000), ImageFormat::Jpeg);
        let generator = VariantGenerator::default();

        let variant = generator.generate(&data, "jpg", VariantKind::Medium).unwrap();
        assert!(variant.width <= 1200);
        assert_eq!(variant.quality, 85);

        let decoded = image::load_from_memory(&variant.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (variant.width, variant.height));
        let expected_height = variant.width as f64 * 2000.0 / 3000.0;
        assert!((variant.height as f64 - expected_height).abs() <= 1.0);
    }

    #[test]
    fn test_thumbnail_is_square_crop() {
        let data = encode(gradient(500, 300), ImageFormat::Png);
        let generator = VariantGenerator::default();

        let variant = generator.generate(&data, "png", VariantKind::Thumbnail).unwrap();
        assert_eq!((variant.width, variant.height), (200, 200));
        assert_eq!(variant.quality, 75);
    }

    #[test]
    fn test_small_png_is_not_upscaled() {
        let data = encode(gradient(80, 60), ImageFormat::Png);
        let generator = VariantGenerator::default();

        let thumb = generator.generate(&data, "png", VariantKind::Thumbnail).unwrap();
        assert_eq!((thumb.width, thumb.height), (80, 60));

        let medium = generator.generate(&data, "png", VariantKind::Medium).unwrap();
        assert_eq!((medium.width, medium.height), (80, 60));
        let decoded = image::load_from_memory(&medium.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (80, 60));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let data = encode(gradient(640, 480), ImageFormat::Png);
        let generator = VariantGenerator::default();

        for kind in VariantKind::ALL {
            let a = generator.generate(&data, "png", kind).unwrap();
            let b = generator.generate(&data, "png", kind).unwrap();
            assert_eq!(a.bytes, b.bytes);
        }
    }

    #[test]
    fn test_transparent_pixels_become_white() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 0])));
        let data = encode(img, ImageFormat::Png);
        let generator = VariantGenerator::new(VariantSettings {
            sharpen: false,
            ..Default::default()
        });

        let decoded = generator.decode(&data, "png").unwrap();
        assert!(decoded.pixels.pixels().all(|p| p.0 == [255, 255, 255]));
    }

    #[test]
    fn test_corrupt_bytes_fail_cleanly() {
        let generator = VariantGenerator::default();
        let result = generator.generate(b"definitely not a jpeg", "jpg", VariantKind::Thumbnail);
        assert!(matches!(
            result,
            Err(VariantError::Processing(_)) | Err(VariantError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_truncated_jpeg_fails_cleanly() {
        let data = encode(gradient(300, 200), ImageFormat::Jpeg);
        let truncated = &data[..20];
        let generator = VariantGenerator::default();
        assert!(generator.generate(truncated, "jpg", VariantKind::Medium).is_err());
    }

    #[test]
    fn test_unsupported_extension() {
        let data = encode(gradient(10, 10), ImageFormat::Png);
        let generator = VariantGenerator::default();
        let result = generator.generate(&data, "gif", VariantKind::Thumbnail);
        assert!(matches!(result, Err(VariantError::UnsupportedFormat(_))));
        assert!(!VariantGenerator::is_supported_extension("pdf"));
        assert!(VariantGenerator::is_supported_extension("TIF"));
    }

    #[test]
    fn test_default_qualities() {
        let settings = VariantSettings::default();
        assert_eq!(settings.quality_for(VariantKind::Thumbnail), 75);
        assert_eq!(settings.quality_for(VariantKind::Medium), 85);
    }
}
