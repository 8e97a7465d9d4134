//! Pixel-level resize operations.
//!
//! These functions combine the dimension math in [`calculations`](super::calculations)
//! with actual resampling. Planning ([`plan_dimensions`]) is split from
//! execution ([`apply_resize`]) so the geometry can be tested without pixels.

use super::calculations::{scale_by_width_dimensions, scale_dimensions, thumbnail_dimensions};
use super::exif::Orientation;
use super::params::{ConversionOp, ResizeOp};
use image::DynamicImage;
use image::imageops::FilterType;

/// Compute the output dimensions for `op` without touching any pixels.
pub fn plan_dimensions(
    source: (u32, u32),
    op: &ConversionOp,
    thumbnail_size: u32,
    orientation: Orientation,
) -> (u32, u32) {
    match op.resize_op {
        ResizeOp::Original => source,
        ResizeOp::Thumbnail => thumbnail_dimensions(source, thumbnail_size),
        ResizeOp::Scale => scale_dimensions(source, op.longest_side),
        ResizeOp::ScaleByWidth => {
            scale_by_width_dimensions(source, op.longest_side, orientation.is_quarter_turn())
        }
    }
}

/// Produce the pixel buffer for `op`.
///
/// The source is never modified. When the planned size equals the source size
/// the image is cloned rather than resampled.
pub fn apply_resize(
    image: &DynamicImage,
    op: &ConversionOp,
    thumbnail_size: u32,
    orientation: Orientation,
) -> DynamicImage {
    let source = (image.width(), image.height());
    let (width, height) = plan_dimensions(source, op, thumbnail_size, orientation);

    if (width, height) == source {
        return image.clone();
    }
    image.resize_exact(width, height, FilterType::Lanczos3)
}
