//! Turning caller requests into conversion ops.
//!
//! Requests arrive as loosely typed JSON. [`resolve_request`] validates one
//! request; [`resolve_batch`] builds the full op list for an upload:
//!
//! 1. A default thumbnail op always comes first.
//! 2. Each request is resolved in order. Malformed requests are skipped and
//!    reported in [`ResolvedBatch::skipped`] instead of failing the batch.
//! 3. Ops are keyed by suffix: a later op replaces an earlier one with the
//!    same suffix, which is how callers override the default thumbnail.
//! 4. If only one distinct op is left, an original-size op is added so
//!    every upload stores at least the source and a thumbnail.
//!
//! Scale requests are measured against an [`OutputBound`] before they are
//! accepted, so no request can ask for an arbitrarily large variant.

use crate::error::Error;
use crate::imaging::operations::plan_dimensions;
use crate::imaging::{
    ConversionOp, ImageDataset, Orientation, ResizeOp, THUMB_SUFFIX, TargetFormat,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One caller-supplied variant request, as received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConversionRequest {
    /// Target format name (`jpeg`, `png`, `gif`, `bmp`, `tiff`). Anything else
    /// keeps the source format.
    pub compress_to: Option<String>,
    pub suffix: String,
    pub longest_side: Option<u32>,
    pub obfuscate: bool,
    /// `original`, `thumbnail` (or `thumb`), `scale`, or `scalebywidth`.
    pub resize_op: String,
    pub private: bool,
}

/// A request the resolver refused, with its position in the input.
#[derive(Debug)]
pub struct SkippedRequest {
    pub index: usize,
    pub suffix: String,
    pub reason: Error,
}

/// The op list for one upload.
#[derive(Debug, Default)]
pub struct ResolvedBatch {
    pub ops: Vec<ConversionOp>,
    pub skipped: Vec<SkippedRequest>,
}

/// Pixel ceiling for scaled variants of one decoded source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputBound {
    source: (u32, u32),
    orientation: Orientation,
    max_pixels: u64,
}

impl OutputBound {
    pub fn new(source: (u32, u32), orientation: Orientation, max_pixels: u64) -> Self {
        Self {
            source,
            orientation,
            max_pixels,
        }
    }

    pub fn for_dataset(dataset: &ImageDataset, max_pixels: u64) -> Self {
        Self::new(dataset.dimensions(), dataset.orientation(), max_pixels)
    }

    /// Whether `op` stays within the ceiling. Original and thumbnail ops
    /// never grow the source and always pass.
    fn admits(&self, op: &ConversionOp) -> bool {
        if !op.resize_op.needs_dimension() {
            return true;
        }
        let (width, height) = plan_dimensions(self.source, op, 0, self.orientation);
        u64::from(width) * u64::from(height) <= self.max_pixels
    }
}

/// Suffixes end up inside a single path component.
fn valid_suffix(suffix: &str) -> bool {
    !suffix.contains(['/', '\\'])
}

/// Validate a single request against `bound`.
///
/// A non-thumbnail request using the reserved `thumb` suffix is renamed to
/// `thumb_` so it cannot replace the batch thumbnail.
pub fn resolve_request(
    request: &ConversionRequest,
    bound: &OutputBound,
) -> Result<ConversionOp, Error> {
    let resize_op = ResizeOp::parse(&request.resize_op)
        .ok_or_else(|| Error::validation("invalid resize operation"))?;

    let longest_side = request.longest_side.unwrap_or(0);
    if resize_op.needs_dimension() && longest_side == 0 {
        return Err(Error::validation("invalid longest side value or operation"));
    }

    if !valid_suffix(&request.suffix) {
        return Err(Error::validation(format!(
            "invalid suffix '{}': path separators are not allowed",
            request.suffix
        )));
    }

    let suffix = if request.suffix == THUMB_SUFFIX && resize_op != ResizeOp::Thumbnail {
        format!("{THUMB_SUFFIX}_")
    } else {
        request.suffix.clone()
    };

    let op = ConversionOp {
        suffix,
        compress_to: TargetFormat::parse(request.compress_to.as_deref()),
        longest_side,
        resize_op,
        obfuscate: request.obfuscate,
        private: request.private,
    };
    if !bound.admits(&op) {
        return Err(Error::validation(format!(
            "requested size exceeds {} pixels",
            bound.max_pixels
        )));
    }
    Ok(op)
}

/// Build the op list for an upload from caller requests.
pub fn resolve_batch(requests: &[ConversionRequest], bound: &OutputBound) -> ResolvedBatch {
    let mut batch = ResolvedBatch {
        ops: vec![ConversionOp::thumbnail()],
        skipped: Vec::new(),
    };

    for (index, request) in requests.iter().enumerate() {
        match resolve_request(request, bound) {
            Ok(op) => {
                debug!(suffix = %op.suffix, resize_op = ?op.resize_op, "Resolved conversion request");
                upsert(&mut batch.ops, op);
            }
            Err(reason) => {
                warn!(index, suffix = %request.suffix, resize_op = %request.resize_op, error = %reason, "Skipping conversion request");
                batch.skipped.push(SkippedRequest {
                    index,
                    suffix: request.suffix.clone(),
                    reason,
                });
            }
        }
    }

    if batch.ops.len() == 1 {
        upsert(&mut batch.ops, ConversionOp::original());
    }

    batch
}

/// Insert `op`, replacing any op with the same suffix in place.
fn upsert(ops: &mut Vec<ConversionOp>, op: ConversionOp) {
    match ops.iter_mut().find(|existing| existing.suffix == op.suffix) {
        Some(existing) => *existing = op,
        None => ops.push(op),
    }
}
