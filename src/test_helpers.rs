//! Shared test utilities: in-memory source images and filesystem checks.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let jpeg = create_test_jpeg_with_exif(64, 48, &exif_with_orientation(6));
//! let dataset = decode(&jpeg, "image/jpeg").unwrap();
//! assert_eq!(dataset.orientation(), Orientation::RotateCW);
//! ```

use crate::imaging::ImageFormat;
use image::{DynamicImage, ImageBuffer, Rgb};
use std::io::Cursor;
use std::path::Path;

// =========================================================================
// Source images
// =========================================================================

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

/// A baseline JPEG of the given size, no EXIF.
pub fn create_test_jpeg(width: u32, height: u32) -> Vec<u8> {
    create_test_image(width, height, ImageFormat::Jpeg)
}

/// An encoded image of the given size and format.
pub fn create_test_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = gradient(width, height);
    let (img, target) = match format {
        ImageFormat::Jpeg => (img, image::ImageFormat::Jpeg),
        ImageFormat::Png => (img, image::ImageFormat::Png),
        ImageFormat::Gif => (DynamicImage::ImageRgba8(img.to_rgba8()), image::ImageFormat::Gif),
        ImageFormat::Bmp => (img, image::ImageFormat::Bmp),
        ImageFormat::Tiff => (img, image::ImageFormat::Tiff),
    };
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, target).unwrap();
    buf.into_inner()
}

/// A JPEG with an APP1 segment holding `payload` right after SOI.
pub fn create_test_jpeg_with_exif(width: u32, height: u32, payload: &[u8]) -> Vec<u8> {
    let jpeg = create_test_jpeg(width, height);
    let length = u16::try_from(payload.len() + 2).unwrap();

    let mut out = Vec::with_capacity(jpeg.len() + payload.len() + 4);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// A big-endian EXIF payload with a single Orientation entry.
pub fn exif_with_orientation(value: u8) -> Vec<u8> {
    let mut payload = b"Exif\0\0".to_vec();
    // TIFF header, IFD0 at offset 8
    payload.extend_from_slice(&[b'M', b'M', 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08]);
    // One entry: tag 0x0112, SHORT, count 1, value
    payload.extend_from_slice(&[0x00, 0x01]);
    payload.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
    payload.extend_from_slice(&[0x00, value, 0x00, 0x00]);
    // No next IFD
    payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    payload
}

// =========================================================================
// Filesystem
// =========================================================================

/// Number of regular files anywhere under `dir`.
pub fn count_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .map(|entry| entry.unwrap().path())
        .map(|path| if path.is_dir() { count_files(&path) } else { 1 })
        .sum()
}
