//! Recording stored uploads with a metadata collaborator.
//!
//! [`ingest`] runs the upload pipeline, then hands an [`AddImageDocument`] to
//! an [`ImageRepository`]. Files and metadata are kept in step: if the
//! repository refuses the document, every variant that was just written is
//! deleted again before the repository's error is returned.

use crate::config::StoreConfig;
use crate::error::Error;
use crate::imaging::{ImageBackend, RustBackend};
use crate::pipeline::process_upload_with_backend;
use crate::resolve::ConversionRequest;
use crate::storage::ShardLayout;
use crate::types::{ImageConversionResult, ImageSizeFormat};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{info, warn};

/// Caller metadata sent alongside the file (the form's `meta` field).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadMeta {
    pub title: String,
    pub tags: Vec<String>,
    pub operations: Vec<ConversionRequest>,
}

/// Parse the `meta` JSON field by field.
///
/// A mistyped field keeps its default and the others are still read. Each
/// entry of `operations` is converted on its own, so one malformed request
/// is dropped without losing its siblings. Input that is not a JSON object
/// yields the defaults.
pub fn parse_upload_meta(raw: &str) -> UploadMeta {
    let mut meta = UploadMeta::default();
    if raw.trim().is_empty() {
        return meta;
    }

    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Ignoring malformed upload metadata");
            return meta;
        }
    };
    let Value::Object(fields) = value else {
        warn!("Ignoring upload metadata that is not an object");
        return meta;
    };

    match fields.get("title") {
        Some(Value::String(title)) => meta.title = title.clone(),
        Some(Value::Null) | None => {}
        Some(other) => warn!(value = %other, "Ignoring non-string title"),
    }

    match fields.get("tags") {
        Some(Value::Array(tags)) => {
            for (index, tag) in tags.iter().enumerate() {
                match tag {
                    Value::String(tag) => meta.tags.push(tag.clone()),
                    other => warn!(index, value = %other, "Ignoring non-string tag"),
                }
            }
        }
        Some(Value::Null) | None => {}
        Some(other) => warn!(value = %other, "Ignoring tags that are not a list"),
    }

    match fields.get("operations") {
        Some(Value::Array(entries)) => {
            for (index, entry) in entries.iter().enumerate() {
                match ConversionRequest::deserialize(entry) {
                    Ok(request) => meta.operations.push(request),
                    Err(e) => warn!(index, error = %e, "Ignoring malformed operation"),
                }
            }
        }
        Some(Value::Null) | None => {}
        Some(other) => warn!(value = %other, "Ignoring operations that are not a list"),
    }

    meta
}

/// What gets recorded for one upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddImageDocument {
    pub title: String,
    /// The client's original filename.
    pub filename: String,
    pub id_name: String,
    pub tags: Vec<String>,
    pub size_formats: Vec<ImageSizeFormat>,
    pub author_id: String,
    pub date_added: DateTime<Utc>,
}

impl AddImageDocument {
    pub fn new(meta: &UploadMeta, result: &ImageConversionResult, author_id: &str) -> Self {
        Self {
            title: meta.title.clone(),
            filename: result.original_filename.clone(),
            id_name: result.id_name.clone(),
            tags: meta.tags.clone(),
            size_formats: result.size_formats.clone(),
            author_id: author_id.to_string(),
            date_added: Utc::now(),
        }
    }
}

/// Metadata store for uploaded images.
pub trait ImageRepository {
    /// Record a document and return its id.
    fn add_image(&self, doc: AddImageDocument) -> Result<String, Error>;
}

/// Repository appending one JSON document per line to a file.
///
/// The returned id is the document's `id_name`.
#[derive(Debug)]
pub struct JsonLinesRepository {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

impl ImageRepository for JsonLinesRepository {
    fn add_image(&self, doc: AddImageDocument) -> Result<String, Error> {
        let mut line = serde_json::to_string(&doc)
            .map_err(|e| Error::persistence("cannot serialize image document").with_source(e))?;
        line.push('\n');

        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::persistence("catalog lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                Error::persistence(format!("cannot open {}", self.path.display())).with_source(e)
            })?;
        file.write_all(line.as_bytes()).map_err(|e| {
            Error::persistence(format!("cannot append to {}", self.path.display())).with_source(e)
        })?;

        Ok(doc.id_name)
    }
}

/// One upload as received.
#[derive(Debug, Clone, Copy)]
pub struct Upload<'a> {
    pub bytes: &'a [u8],
    pub content_type: &'a str,
    pub original_filename: &'a str,
    pub author_id: &'a str,
}

/// A recorded upload.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub id: String,
    pub result: ImageConversionResult,
}

/// Store an upload and record it, with the production backend.
pub fn ingest(
    repository: &impl ImageRepository,
    upload: Upload<'_>,
    meta: &UploadMeta,
    config: &StoreConfig,
) -> Result<Ingested, Error> {
    let backend = RustBackend::new(config.quality(), config.images.thumbnail_size);
    let layout = ShardLayout::from_config(config);
    ingest_with_backend(
        repository,
        &backend,
        &layout,
        config.images.max_output_pixels,
        upload,
        meta,
    )
}

/// Store an upload and record it.
///
/// On a repository failure every written variant is deleted and the
/// repository's error is returned.
pub fn ingest_with_backend(
    repository: &impl ImageRepository,
    backend: &impl ImageBackend,
    layout: &ShardLayout,
    max_output_pixels: u64,
    upload: Upload<'_>,
    meta: &UploadMeta,
) -> Result<Ingested, Error> {
    let result = process_upload_with_backend(
        backend,
        layout,
        max_output_pixels,
        upload.bytes,
        upload.content_type,
        upload.original_filename,
        &meta.operations,
    )?;

    let doc = AddImageDocument::new(meta, &result, upload.author_id);
    match repository.add_image(doc) {
        Ok(id) => {
            info!(id = %id, id_name = %result.id_name, "Recorded image");
            Ok(Ingested { id, result })
        }
        Err(e) => {
            warn!(id_name = %result.id_name, error = %e, "Recording failed, removing stored variants");
            let leftovers = layout.rollback_result(&result);
            if !leftovers.is_empty() {
                warn!(count = leftovers.len(), "Some variants could not be removed");
            }
            Err(e)
        }
    }
}
