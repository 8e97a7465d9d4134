//! Format codec: decode an upload once, encode any number of variants from it.
//!
//! | Format | Decode | Encode |
//! |---|---|---|
//! | JPEG | `image` (jpeg-decoder) + EXIF extraction | `JpegEncoder` at configured quality, EXIF re-embedded via [`ExifWriter`] |
//! | PNG | `image` | `PngEncoder`, best compression, adaptive filtering |
//! | GIF | `image` | `image` GIF encoder (RGBA) |
//! | BMP | `image` | `BmpEncoder` |
//! | TIFF | `image` | `tiff` crate with deflate compression |
//! | HEIC | `libheif-rs` (feature `heif`), becomes a JPEG dataset | n/a |
//!
//! The declared content type only gates which uploads are accepted; the
//! actual decoder is chosen by sniffing the bytes.

use super::backend::BackendError;
use super::exif::{ExifPayload, ExifWriter, Orientation, extract_jpeg_exif};
use super::operations::apply_resize;
use super::params::{ConversionOp, ImageFormat, Quality, ResizeOp};
use crate::error::Error;
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use std::io::Cursor;
use tracing::debug;

pub const HEIC_CONTENT_TYPE: &str = "image/heic";

/// Content types decoded through the `image` crate.
const NATIVE_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/bmp",
    "image/tiff",
];

/// Decoded pixels plus the bytes they came from.
///
/// `original` is `None` when there is no verbatim encoding of the pixels in a
/// supported output format (HEIC uploads).
#[derive(Debug, Clone)]
pub struct SourceImage {
    original: Option<Vec<u8>>,
    pixels: DynamicImage,
}

/// A decoded upload. Read-only once built; every variant is derived from it.
#[derive(Debug, Clone)]
pub enum ImageDataset {
    Jpeg {
        source: SourceImage,
        exif: ExifPayload,
        orientation: Orientation,
    },
    Png(SourceImage),
    Gif(SourceImage),
    Bmp(SourceImage),
    Tiff(SourceImage),
}

impl ImageDataset {
    /// A JPEG dataset with no verbatim source bytes, used for transcoded
    /// uploads. Orientation is read from `exif`.
    pub fn from_jpeg_pixels(pixels: DynamicImage, exif: ExifPayload) -> Self {
        let orientation = exif.orientation();
        ImageDataset::Jpeg {
            source: SourceImage {
                original: None,
                pixels,
            },
            exif,
            orientation,
        }
    }

    fn source(&self) -> &SourceImage {
        match self {
            ImageDataset::Jpeg { source, .. }
            | ImageDataset::Png(source)
            | ImageDataset::Gif(source)
            | ImageDataset::Bmp(source)
            | ImageDataset::Tiff(source) => source,
        }
    }

    pub fn format(&self) -> ImageFormat {
        match self {
            ImageDataset::Jpeg { .. } => ImageFormat::Jpeg,
            ImageDataset::Png(_) => ImageFormat::Png,
            ImageDataset::Gif(_) => ImageFormat::Gif,
            ImageDataset::Bmp(_) => ImageFormat::Bmp,
            ImageDataset::Tiff(_) => ImageFormat::Tiff,
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.source().pixels
    }

    pub fn dimensions(&self) -> (u32, u32) {
        let img = self.image();
        (img.width(), img.height())
    }

    pub fn original_bytes(&self) -> Option<&[u8]> {
        self.source().original.as_deref()
    }

    /// EXIF carried by the source. Only JPEG datasets carry any.
    pub fn exif(&self) -> Option<&ExifPayload> {
        match self {
            ImageDataset::Jpeg { exif, .. } if exif.has_data() => Some(exif),
            _ => None,
        }
    }

    pub fn orientation(&self) -> Orientation {
        match self {
            ImageDataset::Jpeg { orientation, .. } => *orientation,
            _ => Orientation::Horizontal,
        }
    }
}

/// Decode an upload according to its declared content type.
///
/// Parameters after `;` in the content type are ignored. EXIF anomalies never
/// fail a decode; they degrade to no EXIF and horizontal orientation.
pub fn decode(bytes: &[u8], content_type: &str) -> Result<ImageDataset, Error> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if mime == HEIC_CONTENT_TYPE {
        return decode_heic(bytes);
    }
    if !NATIVE_CONTENT_TYPES.contains(&mime.as_str()) {
        debug!(content_type, "Rejecting upload with unsupported content type");
        return Err(Error::decode("invalid image format"));
    }

    let sniffed = image::guess_format(bytes)
        .map_err(|e| Error::decode("invalid image format").with_source(e))?;
    let pixels = image::load_from_memory_with_format(bytes, sniffed)
        .map_err(|e| Error::decode("failed to decode image").with_source(e))?;
    let source = SourceImage {
        original: Some(bytes.to_vec()),
        pixels,
    };

    let dataset = match sniffed {
        image::ImageFormat::Jpeg => {
            let exif = extract_jpeg_exif(bytes);
            let orientation = exif.orientation();
            ImageDataset::Jpeg {
                source,
                exif,
                orientation,
            }
        }
        image::ImageFormat::Png => ImageDataset::Png(source),
        image::ImageFormat::Gif => ImageDataset::Gif(source),
        image::ImageFormat::Bmp => ImageDataset::Bmp(source),
        image::ImageFormat::Tiff => ImageDataset::Tiff(source),
        _ => return Err(Error::decode("invalid image format")),
    };

    let (width, height) = dataset.dimensions();
    debug!(
        format = ?dataset.format(),
        width,
        height,
        orientation = ?dataset.orientation(),
        exif = dataset.exif().is_some(),
        "Decoded upload"
    );
    Ok(dataset)
}

#[cfg(feature = "heif")]
fn decode_heic(bytes: &[u8]) -> Result<ImageDataset, Error> {
    let (pixels, exif) = super::heif::decode_heic(bytes)?;
    debug!(
        width = pixels.width(),
        height = pixels.height(),
        exif = exif.has_data(),
        "Decoded HEIC upload as JPEG dataset"
    );
    Ok(ImageDataset::from_jpeg_pixels(pixels, exif))
}

#[cfg(not(feature = "heif"))]
fn decode_heic(_bytes: &[u8]) -> Result<ImageDataset, Error> {
    Err(Error::decode(
        "HEIC support not compiled in (enable the `heif` feature)",
    ))
}

/// Settings applied to every encode in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSettings {
    pub quality: Quality,
    /// Side of the square every thumbnail must fit in.
    pub thumbnail_size: u32,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            thumbnail_size: 128,
        }
    }
}

/// One encoded variant, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}

/// Encode the variant described by `op`.
///
/// An `Original` op whose target format equals the source format returns the
/// upload's bytes untouched when they are available.
pub fn encode(
    dataset: &ImageDataset,
    op: &ConversionOp,
    settings: EncodeSettings,
) -> Result<EncodedImage, BackendError> {
    let format = op.compress_to.resolve(dataset.format());

    if op.resize_op == ResizeOp::Original
        && format == dataset.format()
        && let Some(original) = dataset.original_bytes()
    {
        let (width, height) = dataset.dimensions();
        return Ok(EncodedImage {
            bytes: original.to_vec(),
            width,
            height,
            format,
        });
    }

    let pixels = apply_resize(
        dataset.image(),
        op,
        settings.thumbnail_size,
        dataset.orientation(),
    );

    let bytes = match format {
        ImageFormat::Jpeg => encode_jpeg(&pixels, settings.quality, dataset.exif())?,
        ImageFormat::Png => encode_png(&pixels)?,
        ImageFormat::Gif => encode_gif(&pixels)?,
        ImageFormat::Bmp => encode_bmp(&pixels)?,
        ImageFormat::Tiff => encode_tiff(&pixels)?,
    };

    Ok(EncodedImage {
        bytes,
        width: pixels.width(),
        height: pixels.height(),
        format,
    })
}

fn encode_failed(format: &str) -> impl Fn(image::ImageError) -> BackendError + '_ {
    move |e| BackendError::Encode(format!("{format} encode failed: {e}"))
}

/// Drop to 8 bits per channel, keeping alpha only when the source has it.
fn to_8bit(img: &DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

/// Encode to JPEG at `quality`, re-embedding `exif` when given.
pub fn encode_jpeg(
    img: &DynamicImage,
    quality: Quality,
    exif: Option<&ExifPayload>,
) -> Result<Vec<u8>, BackendError> {
    let rgb = img.to_rgb8();
    let empty = ExifPayload::empty();
    let mut writer = ExifWriter::new(Vec::new(), exif.unwrap_or(&empty))?;

    JpegEncoder::new_with_quality(&mut writer, quality.value())
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(encode_failed("JPEG"))?;

    Ok(writer.into_inner())
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buf, CompressionType::Best, PngFilter::Adaptive);
    to_8bit(img)
        .write_with_encoder(encoder)
        .map_err(encode_failed("PNG"))?;
    Ok(buf)
}

fn encode_gif(img: &DynamicImage) -> Result<Vec<u8>, BackendError> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img.to_rgba8())
        .write_to(&mut buf, image::ImageFormat::Gif)
        .map_err(encode_failed("GIF"))?;
    Ok(buf.into_inner())
}

fn encode_bmp(img: &DynamicImage) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    to_8bit(img)
        .write_with_encoder(BmpEncoder::new(&mut buf))
        .map_err(encode_failed("BMP"))?;
    Ok(buf)
}

fn encode_tiff(img: &DynamicImage) -> Result<Vec<u8>, BackendError> {
    use tiff::encoder::{TiffEncoder, colortype, compression::Deflate};

    let tiff_failed = |e: tiff::TiffError| BackendError::Encode(format!("TIFF encode failed: {e}"));
    let mut buf = Cursor::new(Vec::new());
    let mut encoder = TiffEncoder::new(&mut buf).map_err(tiff_failed)?;

    let (width, height) = (img.width(), img.height());
    if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        encoder
            .write_image_with_compression::<colortype::RGBA8, _>(
                width,
                height,
                Deflate::default(),
                rgba.as_raw(),
            )
            .map_err(tiff_failed)?;
    } else {
        let rgb = img.to_rgb8();
        encoder
            .write_image_with_compression::<colortype::RGB8, _>(
                width,
                height,
                Deflate::default(),
                rgb.as_raw(),
            )
            .map_err(tiff_failed)?;
    }

    Ok(buf.into_inner())
}
