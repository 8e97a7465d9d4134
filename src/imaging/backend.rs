//! Image backend trait and shared types.
//!
//! The [`ImageBackend`] trait covers the three things the writer needs per
//! variant: encode, write, and remove. Keeping file I/O behind the trait lets
//! commit and rollback logic be tested with [`tests::MockBackend`], which can
//! be told to fail on demand.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::codec::{EncodedImage, ImageDataset};
use super::params::ConversionOp;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Trait for image backends.
///
/// Must be `Sync`: the writer calls it from every rayon worker at once.
pub trait ImageBackend: Sync {
    /// Produce the bytes for one variant.
    fn encode(&self, dataset: &ImageDataset, op: &ConversionOp) -> Result<EncodedImage, BackendError>;

    /// Write a variant to `path`, replacing any existing file.
    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), BackendError>;

    /// Remove a previously written variant.
    fn remove_file(&self, path: &Path) -> Result<(), BackendError>;
}
