use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use img_parts::jpeg::Jpeg;
use img_parts::ImageEXIF;
use std::io::Cursor;

fn pattern(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 251) as u8, (y % 241) as u8, ((x / 7 + y / 5) % 256) as u8])
    })
}

/// Baseline JPEG of the given size.
pub fn create_test_jpeg(width: u32, height: u32) -> Bytes {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, 90)
        .encode_image(&DynamicImage::ImageRgb8(pattern(width, height)))
        .expect("encode jpeg");
    Bytes::from(buffer)
}

pub fn create_test_png(width: u32, height: u32) -> Bytes {
    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(pattern(width, height))
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .expect("encode png");
    Bytes::from(buffer)
}

/// Fully transparent RGBA PNG.
pub fn create_transparent_png(width: u32, height: u32) -> Bytes {
    let mut buffer = Vec::new();
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0])))
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .expect("encode png");
    Bytes::from(buffer)
}

/// Minimal little-endian TIFF block with a single Orientation entry.
fn orientation_exif(orientation: u16) -> Vec<u8> {
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes());
    // IFD0: one entry
    tiff.extend_from_slice(&1u16.to_le_bytes());
    tiff.extend_from_slice(&0x0112u16.to_le_bytes());
    tiff.extend_from_slice(&3u16.to_le_bytes()); // SHORT
    tiff.extend_from_slice(&1u32.to_le_bytes());
    tiff.extend_from_slice(&orientation.to_le_bytes());
    tiff.extend_from_slice(&[0, 0]);
    tiff.extend_from_slice(&0u32.to_le_bytes());
    tiff
}

/// JPEG whose pixels are stored sideways with an EXIF orientation tag.
pub fn create_oriented_jpeg(width: u32, height: u32, orientation: u16) -> Bytes {
    let mut jpeg = Jpeg::from_bytes(create_test_jpeg(width, height)).expect("parse jpeg");
    jpeg.set_exif(Some(Bytes::from(orientation_exif(orientation))));

    let mut buffer = Vec::new();
    jpeg.encoder().write_to(&mut buffer).expect("write jpeg");
    Bytes::from(buffer)
}

/// Bytes that claim to be an image and are not.
pub fn create_corrupt_image() -> Bytes {
    Bytes::from_static(b"\x89PNG\r\n\x1a\nthis is not really a png at all")
}
