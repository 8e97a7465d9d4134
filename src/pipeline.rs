//! Upload entry point: decode, resolve ops, commit.
//!
//! ```text
//! bytes + content type ──decode──▶ ImageDataset
//! requests ──────────resolve_batch──▶ ops (thumbnail first, original if alone,
//!                                        oversized scales skipped)
//! ImageWriter::new + add_op* ──commit──▶ ImageConversionResult | Err(Write)
//! ```
//!
//! Decode and layout errors are returned before anything is written.

use crate::config::StoreConfig;
use crate::error::Error;
use crate::imaging::{ImageBackend, RustBackend, decode};
use crate::resolve::{ConversionRequest, OutputBound, resolve_batch};
use crate::storage::ShardLayout;
use crate::types::ImageConversionResult;
use crate::writer::ImageWriter;
use tracing::info;

/// Process one upload with the production backend built from `config`.
pub fn process_upload(
    bytes: &[u8],
    content_type: &str,
    original_filename: &str,
    requests: &[ConversionRequest],
    config: &StoreConfig,
) -> Result<ImageConversionResult, Error> {
    let backend = RustBackend::new(config.quality(), config.images.thumbnail_size);
    let layout = ShardLayout::from_config(config);
    process_upload_with_backend(
        &backend,
        &layout,
        config.images.max_output_pixels,
        bytes,
        content_type,
        original_filename,
        requests,
    )
}

/// Process one upload through an arbitrary backend and layout.
///
/// Scale requests planning more than `max_output_pixels` are skipped.
pub fn process_upload_with_backend(
    backend: &impl ImageBackend,
    layout: &ShardLayout,
    max_output_pixels: u64,
    bytes: &[u8],
    content_type: &str,
    original_filename: &str,
    requests: &[ConversionRequest],
) -> Result<ImageConversionResult, Error> {
    let dataset = decode(bytes, content_type)?;
    let batch = resolve_batch(requests, &OutputBound::for_dataset(&dataset, max_output_pixels));
    info!(
        original = %original_filename,
        format = ?dataset.format(),
        ops = batch.ops.len(),
        skipped = batch.skipped.len(),
        "Processing upload"
    );

    let mut writer = ImageWriter::new(original_filename, &dataset, layout);
    for op in batch.ops {
        writer.add_op(op);
    }
    writer.commit(backend)
}
