//! HEIC decoding via the system libheif (feature `heif`).
//!
//! HEIC uploads are turned into plain RGB pixels plus an EXIF payload in the
//! shape a JPEG APP1 segment expects, so the rest of the pipeline can treat
//! them as JPEG sources.

use super::exif::ExifPayload;
use crate::error::Error;
use image::{DynamicImage, RgbImage};
use libheif_rs::{ColorSpace, HeifContext, ItemId, LibHeif, RgbChroma};
use tracing::debug;

const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Decode the primary image of a HEIC file.
pub fn decode_heic(bytes: &[u8]) -> Result<(DynamicImage, ExifPayload), Error> {
    let heic_failed = |e: libheif_rs::HeifError| Error::decode("failed to decode HEIC image").with_source(e);

    let lib_heif = LibHeif::new();
    let ctx = HeifContext::read_from_bytes(bytes).map_err(heic_failed)?;
    let handle = ctx.primary_image_handle().map_err(heic_failed)?;

    let exif = read_exif_block(&handle);

    let decoded = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(heic_failed)?;
    let planes = decoded.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| Error::decode("HEIC image has no interleaved RGB plane"))?;

    let (width, height, stride) = (plane.width, plane.height, plane.stride);
    let row_len = width as usize * 3;
    let mut rgb = Vec::with_capacity(row_len * height as usize);
    for row in plane.data.chunks(stride).take(height as usize) {
        rgb.extend_from_slice(&row[..row_len]);
    }

    let pixels = RgbImage::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| Error::decode("HEIC plane smaller than its dimensions"))?;

    Ok((pixels, exif))
}

/// First `Exif` metadata block, rewritten to APP1 payload form.
///
/// A missing or unreadable block is not an error.
fn read_exif_block(handle: &libheif_rs::ImageHandle) -> ExifPayload {
    let mut ids: [ItemId; 1] = [0];
    if handle.metadata_block_ids(&mut ids, b"Exif") == 0 {
        return ExifPayload::empty();
    }

    match handle.metadata(ids[0]) {
        Ok(block) => ExifPayload::new(to_app1_payload(&block)),
        Err(e) => {
            debug!(error = %e, "Unreadable HEIC EXIF block, ignoring");
            ExifPayload::empty()
        }
    }
}

/// HEIF EXIF blocks start with a big-endian u32 offset to the TIFF header.
/// APP1 wants `Exif\0\0` directly followed by the TIFF header.
fn to_app1_payload(block: &[u8]) -> Vec<u8> {
    let Some((offset, rest)) = block.split_first_chunk::<4>() else {
        return Vec::new();
    };
    let skip = u32::from_be_bytes(*offset) as usize;
    let Some(tiff) = rest.get(skip..) else {
        return Vec::new();
    };

    let tiff = tiff.strip_prefix(EXIF_HEADER).unwrap_or(tiff);
    let mut payload = Vec::with_capacity(EXIF_HEADER.len() + tiff.len());
    payload.extend_from_slice(EXIF_HEADER);
    payload.extend_from_slice(tiff);
    payload
}
