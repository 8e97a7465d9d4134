//! Production backend: the [`codec`](super::codec) plus `std::fs`.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Resize | `image::DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode JPEG/PNG/GIF/BMP | `image::codecs::*` |
//! | Encode TIFF | `tiff::encoder::TiffEncoder` with deflate |
//! | Write | `std::fs::write` then owner read/write permissions |
//! | Remove | `std::fs::remove_file` |

use super::backend::{BackendError, ImageBackend};
use super::codec::{self, EncodeSettings, EncodedImage, ImageDataset};
use super::params::{ConversionOp, Quality};
use std::path::Path;

/// Mode for stored variants: owner read/write, everyone else read.
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustBackend {
    settings: EncodeSettings,
}

impl RustBackend {
    pub fn new(quality: Quality, thumbnail_size: u32) -> Self {
        Self {
            settings: EncodeSettings {
                quality,
                thumbnail_size,
            },
        }
    }
}

impl ImageBackend for RustBackend {
    fn encode(&self, dataset: &ImageDataset, op: &ConversionOp) -> Result<EncodedImage, BackendError> {
        codec::encode(dataset, op, self.settings)
    }

    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), BackendError> {
        std::fs::write(path, bytes)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(FILE_MODE))?;
        }

        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<(), BackendError> {
        std::fs::remove_file(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::codec::decode;
    use crate::imaging::params::{ImageFormat, ResizeOp, TargetFormat};
    use crate::test_helpers::create_test_jpeg;

    #[test]
    fn encode_uses_configured_thumbnail_size() {
        let backend = RustBackend::new(Quality::new(80), 32);
        let dataset = decode(&create_test_jpeg(200, 100), "image/jpeg").unwrap();

        let encoded = backend.encode(&dataset, &ConversionOp::thumbnail()).unwrap();
        assert_eq!((encoded.width, encoded.height), (32, 16));
    }

    #[test]
    fn lower_quality_gives_smaller_jpeg() {
        let dataset = decode(&create_test_jpeg(256, 256), "image/jpeg").unwrap();
        let op = ConversionOp {
            suffix: "small".into(),
            resize_op: ResizeOp::Scale,
            longest_side: 200,
            compress_to: TargetFormat::Format(ImageFormat::Jpeg),
            ..ConversionOp::original()
        };

        let high = RustBackend::new(Quality::new(95), 128).encode(&dataset, &op).unwrap();
        let low = RustBackend::new(Quality::new(10), 128).encode(&dataset, &op).unwrap();
        assert!(low.bytes.len() < high.bytes.len());
    }

    #[test]
    fn write_and_remove_synthetic_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("abc@thumb.jpg");
        let backend = RustBackend::default();

        backend.write_file(&path, b"bytes").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"bytes");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o644);
        }

        backend.remove_file(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn write_into_missing_directory_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("missing/abc@thumb.jpg");
        assert!(RustBackend::default().write_file(&path, b"bytes").is_err());
    }

    #[test]
    fn remove_nonexistent_file_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let result = RustBackend::default().remove_file(&tmp.path().join("gone.jpg"));
        assert!(matches!(result, Err(BackendError::Io(_))));
    }
}
