//! Parameter types for image operations.
//!
//! These describe *what* to produce for one variant, not *how*. The resolver
//! builds them from caller requests, the writer keys them by suffix, and the
//! backend turns them into bytes.
//!
//! ## Types
//!
//! - [`ImageFormat`]: the closed set of formats we decode and encode.
//! - [`TargetFormat`]: an encode target, either `Same` (keep the source
//!   format) or an explicit [`ImageFormat`].
//! - [`ResizeOp`]: which geometry to apply.
//! - [`ConversionOp`]: one fully resolved variant request.
//! - [`Quality`]: JPEG quality (1–100, default 75). Clamped on construction.

use serde::{Deserialize, Serialize};

/// Suffix reserved for the thumbnail every batch carries.
pub const THUMB_SUFFIX: &str = "thumb";

/// Suffix used by the injected original-size variant.
pub const ORIGINAL_SUFFIX: &str = "original";

/// Quality setting for JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

/// Image formats the codec can decode and encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Tiff,
}

impl ImageFormat {
    /// File extension used when storing a variant of this format.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Tiff => "tiff",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Tiff => "image/tiff",
        }
    }

    /// Map a stored file extension back to its format. Case-insensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "gif" => Some(ImageFormat::Gif),
            "bmp" => Some(ImageFormat::Bmp),
            "tif" | "tiff" => Some(ImageFormat::Tiff),
            _ => None,
        }
    }

    /// Parse a caller-supplied `compressTo` name.
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "gif" => Some(ImageFormat::Gif),
            "bmp" => Some(ImageFormat::Bmp),
            "tiff" | "tif" => Some(ImageFormat::Tiff),
            _ => None,
        }
    }
}

/// MIME type for a stored filename, by extension.
///
/// Anything we don't recognise is served as `application/octet-stream`.
pub fn mime_type_for_filename(filename: &str) -> &'static str {
    filename
        .rsplit_once('.')
        .and_then(|(_, ext)| ImageFormat::from_extension(ext))
        .map(ImageFormat::mime_type)
        .unwrap_or("application/octet-stream")
}

/// Encode target for a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetFormat {
    /// Keep whatever format the source decoded as.
    #[default]
    Same,
    Format(ImageFormat),
}

impl TargetFormat {
    /// Parse an optional `compressTo` value. Missing, empty, or unknown names
    /// all mean [`TargetFormat::Same`].
    pub fn parse(name: Option<&str>) -> Self {
        name.and_then(ImageFormat::from_name)
            .map(TargetFormat::Format)
            .unwrap_or(TargetFormat::Same)
    }

    /// The concrete format this target encodes to for a given source.
    pub fn resolve(self, source: ImageFormat) -> ImageFormat {
        match self {
            TargetFormat::Same => source,
            TargetFormat::Format(format) => format,
        }
    }
}

/// Geometry applied to the source before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeOp {
    /// Keep the source dimensions.
    #[default]
    Original,
    /// Fit inside the configured square bound.
    Thumbnail,
    /// Set the longest side to `longest_side`.
    Scale,
    /// Set the visual width to `longest_side`.
    ScaleByWidth,
}

impl ResizeOp {
    /// Parse a caller-supplied `resizeOp` string. Case-insensitive; `thumb`
    /// is accepted as an alias for `thumbnail`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "original" => Some(ResizeOp::Original),
            "thumbnail" | "thumb" => Some(ResizeOp::Thumbnail),
            "scale" => Some(ResizeOp::Scale),
            "scalebywidth" => Some(ResizeOp::ScaleByWidth),
            _ => None,
        }
    }

    /// Whether this op needs a positive `longest_side`.
    pub fn needs_dimension(self) -> bool {
        matches!(self, ResizeOp::Scale | ResizeOp::ScaleByWidth)
    }
}

/// One resolved variant to produce and store.
///
/// `suffix` is the key within a batch: registering a second op with the same
/// suffix replaces the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOp {
    pub suffix: String,
    pub compress_to: TargetFormat,
    /// Target dimension for `Scale`/`ScaleByWidth`; 0 when unused.
    pub longest_side: u32,
    pub resize_op: ResizeOp,
    /// Give this variant its own random name with no suffix.
    pub obfuscate: bool,
    pub private: bool,
}

impl ConversionOp {
    /// The thumbnail injected into every batch.
    pub fn thumbnail() -> Self {
        Self {
            suffix: THUMB_SUFFIX.to_string(),
            compress_to: TargetFormat::Same,
            longest_side: 0,
            resize_op: ResizeOp::Thumbnail,
            obfuscate: false,
            private: false,
        }
    }

    /// The original-size variant injected when a batch would only hold the
    /// thumbnail.
    pub fn original() -> Self {
        Self {
            suffix: ORIGINAL_SUFFIX.to_string(),
            resize_op: ResizeOp::Original,
            ..Self::thumbnail()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_75() {
        assert_eq!(Quality::default().value(), 75);
    }

    #[test]
    fn mime_types() {
        assert_eq!(ImageFormat::Jpeg.mime_type(), "image/jpeg");
        assert_eq!(ImageFormat::Png.mime_type(), "image/png");
        assert_eq!(ImageFormat::Gif.mime_type(), "image/gif");
        assert_eq!(ImageFormat::Bmp.mime_type(), "image/bmp");
        assert_eq!(ImageFormat::Tiff.mime_type(), "image/tiff");
    }

    #[test]
    fn mime_type_for_stored_filenames() {
        assert_eq!(mime_type_for_filename("abc@thumb.jpg"), "image/jpeg");
        assert_eq!(mime_type_for_filename("abc.TIFF"), "image/tiff");
        assert_eq!(mime_type_for_filename("abc.webp"), "application/octet-stream");
        assert_eq!(mime_type_for_filename("noext"), "application/octet-stream");
    }

    #[test]
    fn extension_roundtrips_through_from_extension() {
        for format in [
            ImageFormat::Jpeg,
            ImageFormat::Png,
            ImageFormat::Gif,
            ImageFormat::Bmp,
            ImageFormat::Tiff,
        ] {
            assert_eq!(ImageFormat::from_extension(format.extension()), Some(format));
        }
    }

    #[test]
    fn target_format_parse() {
        assert_eq!(TargetFormat::parse(None), TargetFormat::Same);
        assert_eq!(TargetFormat::parse(Some("")), TargetFormat::Same);
        assert_eq!(TargetFormat::parse(Some("webp")), TargetFormat::Same);
        assert_eq!(
            TargetFormat::parse(Some("PNG")),
            TargetFormat::Format(ImageFormat::Png)
        );
        assert_eq!(
            TargetFormat::parse(Some("jpeg")),
            TargetFormat::Format(ImageFormat::Jpeg)
        );
    }

    #[test]
    fn target_format_resolve() {
        assert_eq!(TargetFormat::Same.resolve(ImageFormat::Gif), ImageFormat::Gif);
        assert_eq!(
            TargetFormat::Format(ImageFormat::Png).resolve(ImageFormat::Gif),
            ImageFormat::Png
        );
    }

    #[test]
    fn resize_op_parse() {
        assert_eq!(ResizeOp::parse("original"), Some(ResizeOp::Original));
        assert_eq!(ResizeOp::parse("Thumbnail"), Some(ResizeOp::Thumbnail));
        assert_eq!(ResizeOp::parse("thumb"), Some(ResizeOp::Thumbnail));
        assert_eq!(ResizeOp::parse("SCALE"), Some(ResizeOp::Scale));
        assert_eq!(ResizeOp::parse("scalebywidth"), Some(ResizeOp::ScaleByWidth));
        assert_eq!(ResizeOp::parse("crop"), None);
        assert_eq!(ResizeOp::parse(""), None);
    }

    #[test]
    fn default_ops() {
        let thumb = ConversionOp::thumbnail();
        assert_eq!(thumb.suffix, "thumb");
        assert_eq!(thumb.resize_op, ResizeOp::Thumbnail);

        let original = ConversionOp::original();
        assert_eq!(original.suffix, "original");
        assert_eq!(original.resize_op, ResizeOp::Original);
        assert_eq!(original.compress_to, TargetFormat::Same);
    }
}
