//! # Pixel Depot
//!
//! Image ingestion core: take one uploaded image, derive every requested
//! size and format from a single decode, and store the variants in a sharded
//! directory tree. A batch is all-or-nothing: either every variant is on disk
//! or none is.
//!
//! # Pipeline
//!
//! ```text
//! 1. Decode    bytes + content type  →  ImageDataset   (format, pixels, EXIF, orientation)
//! 2. Resolve   ConversionRequest[]   →  ConversionOp[] (thumbnail first, original if alone)
//! 3. Commit    ImageWriter           →  ImageConversionResult, or nothing on disk
//! ```
//!
//! Decoding happens once. During commit each op is encoded and written on
//! the rayon pool; the decoded pixels are shared read-only between workers.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Decode, resize math, EXIF handling, per-format encoders, the backend seam |
//! | [`resolve`] | Validates caller requests and builds the op list for an upload |
//! | [`writer`] | Commits a batch of ops, rolling back every written file on any failure |
//! | [`pipeline`] | `process_upload`: decode, resolve, commit |
//! | [`persistence`] | Upload metadata, the metadata store trait, `ingest` with file rollback |
//! | [`storage`] | Sharded path policy, directory checks, delete and rename of stored variants |
//! | [`naming`] | Stored filename convention (`{name}@{suffix}.{ext}`) and random names |
//! | [`types`] | Result descriptors returned to callers |
//! | [`config`] | `depot.toml` loading, environment overrides, validation |
//! | [`error`] | Crate error type with a kind for callers to match on |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Original Bytes Are Stored Verbatim
//!
//! An `original` variant in the source's own format is the uploaded file,
//! byte for byte. Re-encoding would lose quality and metadata for nothing.
//! HEIC uploads are the exception: they are decoded to pixels and always
//! stored as JPEG.
//!
//! ## EXIF Travels With JPEG Variants
//!
//! The JPEG encoder drops all metadata, so the source's APP1 segment is
//! spliced back in after SOI. Orientation is never applied to pixels;
//! viewers rotate from the tag, and dimension math uses the displayed
//! orientation.
//!
//! ## Explicit Configuration
//!
//! Nothing reads the environment while processing. The binary builds one
//! [`config::StoreConfig`] at startup and passes it down.

pub mod config;
pub mod error;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod persistence;
pub mod pipeline;
pub mod resolve;
pub mod storage;
pub mod types;
pub mod writer;

pub use error::{Error, ErrorKind};
pub use pipeline::{process_upload, process_upload_with_backend};

#[cfg(test)]
pub(crate) mod test_helpers;
