//! Batch writer: encode and store every variant of one upload, or none.
//!
//! ## Lifecycle
//!
//! ```text
//! ImageWriter::new ──add_op*──▶ commit(self) ──┬─▶ Ok(ImageConversionResult)   all written
//!    (collecting)                (committing)  └─▶ Err(Write)                   all removed
//! ```
//!
//! `commit` takes the writer by value, so ops cannot be added to a batch that
//! is already committing or done.
//!
//! ## Parallel Processing
//!
//! Each op is one unit of work on the rayon pool: pick the filename, ensure
//! the shard directory, encode, write. Units share the decoded dataset
//! read-only and never talk to each other. Collecting the per-unit results is
//! the barrier; nothing is decided until every unit has reported.
//!
//! If any unit failed, every file that was written is removed and a single
//! write error is returned. A unit that panics counts as failed. Per-unit
//! errors and failed removals are logged, never returned.

use crate::error::Error;
use crate::imaging::{ConversionOp, ImageBackend, ImageDataset};
use crate::naming::{make_filename, random_name};
use crate::storage::ShardLayout;
use crate::types::{ImageConversionResult, ImageSize, ImageSizeFormat};
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Message of the error returned when a batch is rolled back.
pub const ROLLBACK_MESSAGE: &str = "write error, rolling back operation";

/// Collects the ops for one upload and commits them as a unit.
pub struct ImageWriter<'a> {
    original_filename: String,
    dataset: &'a ImageDataset,
    layout: &'a ShardLayout,
    ops: Vec<ConversionOp>,
}

impl<'a> ImageWriter<'a> {
    pub fn new(
        original_filename: impl Into<String>,
        dataset: &'a ImageDataset,
        layout: &'a ShardLayout,
    ) -> Self {
        Self {
            original_filename: original_filename.into(),
            dataset,
            layout,
            ops: Vec::new(),
        }
    }

    /// Register an op. An op with the same suffix is replaced.
    pub fn add_op(&mut self, op: ConversionOp) {
        match self.ops.iter_mut().find(|existing| existing.suffix == op.suffix) {
            Some(existing) => *existing = op,
            None => self.ops.push(op),
        }
    }

    /// Encode and write every registered op.
    ///
    /// Non-obfuscated variants share one random name; each obfuscated variant
    /// gets its own.
    pub fn commit(self, backend: &impl ImageBackend) -> Result<ImageConversionResult, Error> {
        let id_name = random_name();
        info!(
            id_name = %id_name,
            original = %self.original_filename,
            ops = self.ops.len(),
            "Committing image batch"
        );

        let outcomes: Vec<Result<ImageSizeFormat, Error>> = self
            .ops
            .par_iter()
            .map(|op| {
                let name = if op.obfuscate {
                    random_name()
                } else {
                    id_name.clone()
                };
                panic::catch_unwind(AssertUnwindSafe(|| self.write_variant(backend, op, &name)))
                    .unwrap_or_else(|_| Err(Error::encode(format!("variant '{}' panicked", op.suffix))))
                    .inspect_err(|e| error!(suffix = %op.suffix, error = %e, "Variant failed"))
            })
            .collect();

        let mut written = Vec::with_capacity(outcomes.len());
        let mut failures = 0usize;
        for outcome in outcomes {
            match outcome {
                Ok(variant) => written.push(variant),
                Err(_) => failures += 1,
            }
        }

        if failures > 0 {
            warn!(
                id_name = %id_name,
                failures,
                written = written.len(),
                "Rolling back image batch"
            );
            self.rollback(backend, &written);
            return Err(Error::write(ROLLBACK_MESSAGE));
        }

        info!(id_name = %id_name, variants = written.len(), "Committed image batch");
        Ok(ImageConversionResult {
            id_name,
            original_filename: self.original_filename,
            size_formats: written,
        })
    }

    /// One unit of work.
    fn write_variant(
        &self,
        backend: &impl ImageBackend,
        op: &ConversionOp,
        name: &str,
    ) -> Result<ImageSizeFormat, Error> {
        let format = op.compress_to.resolve(self.dataset.format());
        let filename = make_filename(name, &op.suffix, format.extension(), op.obfuscate);
        debug!(suffix = %op.suffix, filename = %filename, "Writing variant");

        let path = self.layout.prepare(&filename)?;

        let encoded = backend.encode(self.dataset, op).map_err(|e| {
            Error::encode(format!("cannot encode variant '{}'", op.suffix)).with_source(e)
        })?;

        if let Err(e) = backend.write_file(&path, &encoded.bytes) {
            discard_partial(backend, &path);
            return Err(Error::write(format!("cannot write {}", path.display())).with_source(e));
        }

        Ok(ImageSizeFormat {
            format_name: op.suffix.clone(),
            filename,
            image_size: ImageSize {
                width: encoded.width,
                height: encoded.height,
            },
            file_size: encoded.bytes.len() as u64,
            image_type: encoded.format,
            private: op.private,
        })
    }

    /// Remove every written variant. Best effort: all removals are attempted.
    fn rollback(&self, backend: &impl ImageBackend, written: &[ImageSizeFormat]) {
        let failed = written
            .iter()
            .filter(|variant| {
                let path = self.layout.file_path(&variant.filename);
                backend
                    .remove_file(&path)
                    .inspect_err(|e| {
                        warn!(filename = %variant.filename, error = %e, "Rollback delete failed")
                    })
                    .is_err()
            })
            .count();

        if failed > 0 {
            warn!(failed, "Rollback left files behind");
        }
    }
}

/// A failed write may still have created the file.
fn discard_partial(backend: &impl ImageBackend, path: &Path) {
    if path.exists()
        && let Err(e) = backend.remove_file(path)
    {
        warn!(path = %path.display(), error = %e, "Could not remove partial write");
    }
}
