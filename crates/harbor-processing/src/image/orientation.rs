use bytes::Bytes;
use image::{imageops, RgbImage};
use img_parts::{jpeg::Jpeg, png::Png, webp::WebP, ImageEXIF};
use std::io::Cursor;

/// Image orientation operations (rotation and flipping)
pub struct ImageOrientation;

impl ImageOrientation {
    /// Read the EXIF orientation tag (1–8). Returns 1 when absent or unreadable.
    ///
    /// JPEG, PNG and WebP carry EXIF in a container segment which is pulled out
    /// with img-parts; TIFF is itself the EXIF container.
    pub fn read_exif_orientation(data: &[u8]) -> u8 {
        let reader = exif::Reader::new();

        let parsed = match Self::embedded_exif(data) {
            Some(raw) => reader.read_raw(raw.to_vec()),
            None => reader.read_from_container(&mut Cursor::new(data)),
        };

        let Ok(exif) = parsed else {
            return 1;
        };

        exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .filter(|value| (1..=8).contains(value))
            .map(|value| value as u8)
            .unwrap_or(1)
    }

    fn embedded_exif(data: &[u8]) -> Option<Bytes> {
        let bytes = Bytes::copy_from_slice(data);
        if let Ok(jpeg) = Jpeg::from_bytes(bytes.clone()) {
            return jpeg.exif();
        }
        if let Ok(png) = Png::from_bytes(bytes.clone()) {
            return png.exif();
        }
        if let Ok(webp) = WebP::from_bytes(bytes) {
            return webp.exif();
        }
        None
    }

    /// Rotation and flips that make an image upright, applied in that order
    /// by [`Self::apply`]. Returns (rotate_angle, flip_horizontal, flip_vertical).
    pub fn get_orientation_transforms(orientation: u8) -> (Option<u16>, bool, bool) {
        match orientation {
            1 => (None, false, false),      // Normal
            2 => (None, true, false),       // Mirror horizontal
            3 => (Some(180), false, false), // Rotate 180
            4 => (None, false, true),       // Mirror vertical
            5 => (Some(90), true, false),   // Transpose
            6 => (Some(90), false, false),  // Rotate 90 CW
            7 => (Some(270), true, false),  // Transverse
            8 => (Some(270), false, false), // Rotate 270 CW
            _ => (None, false, false),      // Invalid, treat as normal
        }
    }

    /// Make `img` visually upright according to `orientation`.
    pub fn apply(mut img: RgbImage, orientation: u8) -> RgbImage {
        let (rotate, flip_h, flip_v) = Self::get_orientation_transforms(orientation);

        if orientation != 1 {
            tracing::debug!(
                orientation = orientation,
                rotate = ?rotate,
                flip_horizontal = flip_h,
                flip_vertical = flip_v,
                "Applying EXIF orientation"
            );
        }

        if let Some(angle) = rotate {
            img = Self::rotate_by_angle(img, angle);
        }
        if flip_h {
            img = imageops::flip_horizontal(&img);
        }
        if flip_v {
            img = imageops::flip_vertical(&img);
        }

        img
    }

    /// Rotate image by specified angle (90, 180, or 270 degrees clockwise)
    pub fn rotate_by_angle(img: RgbImage, angle: u16) -> RgbImage {
        match angle {
            90 => imageops::rotate90(&img),
            180 => imageops::rotate180(&img),
            270 => imageops::rotate270(&img),
            _ => img,
        }
    }
}
