//! Image processing: decode, resize, encode, and EXIF handling.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory_with_format`, `libheif-rs` for HEIC |
//! | **EXIF** | custom byte scanner (JPEG APP1) |
//! | **Resize** | Lanczos3, round-half-to-even dimension math |
//! | **Encode** | `image` codecs, `tiff` for deflate TIFF |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing one variant
//! - **EXIF**: APP1 extraction, orientation, re-embedding writer
//! - **Codec**: [`ImageDataset`], [`decode`], [`encode`]
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Pixel resizing driven by the calculations

pub mod backend;
mod calculations;
pub mod codec;
pub mod exif;
#[cfg(feature = "heif")]
mod heif;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use calculations::{
    calculate_other_side, calculate_shorter_dimension, scale_by_width_dimensions,
    scale_dimensions, thumbnail_dimensions,
};
pub use codec::{EncodeSettings, EncodedImage, ImageDataset, decode, encode};
pub use exif::{ExifPayload, ExifWriter, Orientation, extract_jpeg_exif};
pub use params::{
    ConversionOp, ImageFormat, ORIGINAL_SUFFIX, Quality, ResizeOp, THUMB_SUFFIX, TargetFormat,
    mime_type_for_filename,
};
pub use rust_backend::RustBackend;
