//! Target geometry for each variant kind. Never enlarges.

/// How to turn a source into a square thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailPlan {
    /// Centered crop `(x, y, side)` on the source, if any.
    pub crop: Option<(u32, u32, u32)>,
    pub width: u32,
    pub height: u32,
}

/// Crop-to-fill a `box_size` square.
///
/// A source that already fits inside the box is kept at its own size.
/// Otherwise the shorter side is centered and cropped square, then scaled
/// down to at most `box_size`.
pub fn thumbnail_plan(width: u32, height: u32, box_size: u32) -> ThumbnailPlan {
    if width <= box_size && height <= box_size {
        return ThumbnailPlan {
            crop: None,
            width,
            height,
        };
    }

    let short = width.min(height);
    let side = box_size.min(short);
    let x = (width - short) / 2;
    let y = (height - short) / 2;

    ThumbnailPlan {
        crop: Some((x, y, short)),
        width: side,
        height: side,
    }
}

/// Fit within `max_width`, keeping the aspect ratio. Height rounds to nearest.
pub fn medium_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width {
        return (width, height);
    }

    let scaled = (height as f64 * max_width as f64 / width as f64).round() as u32;
    (max_width, scaled.clamp(1, height))
}
