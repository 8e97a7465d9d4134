//! Result types handed to callers and the persistence layer.
//!
//! These are serialized to JSON (camelCase) by the CLI and stored as-is by
//! metadata collaborators, so field names are part of the external contract.

use crate::imaging::ImageFormat;
use serde::{Deserialize, Serialize};

/// Pixel dimensions of a stored variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// One stored variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSizeFormat {
    /// The variant's suffix, e.g. `thumb`.
    pub format_name: String,
    pub filename: String,
    pub image_size: ImageSize,
    /// Stored size in bytes.
    pub file_size: u64,
    pub image_type: ImageFormat,
    pub private: bool,
}

/// Everything written for one upload.
///
/// Only ever built after every variant of the batch was written. Ordering of
/// `size_formats` is unspecified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConversionResult {
    pub id_name: String,
    pub original_filename: String,
    pub size_formats: Vec<ImageSizeFormat>,
}

impl ImageConversionResult {
    /// Find a variant by suffix.
    pub fn variant(&self, format_name: &str) -> Option<&ImageSizeFormat> {
        self.size_formats
            .iter()
            .find(|f| f.format_name == format_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ImageConversionResult {
        ImageConversionResult {
            id_name: "abc".into(),
            original_filename: "cat.jpg".into(),
            size_formats: vec![ImageSizeFormat {
                format_name: "thumb".into(),
                filename: "abc@thumb.jpg".into(),
                image_size: ImageSize {
                    width: 128,
                    height: 96,
                },
                file_size: 2048,
                image_type: ImageFormat::Jpeg,
                private: false,
            }],
        }
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["idName"], "abc");
        assert_eq!(json["originalFilename"], "cat.jpg");
        let first = &json["sizeFormats"][0];
        assert_eq!(first["formatName"], "thumb");
        assert_eq!(first["imageSize"]["width"], 128);
        assert_eq!(first["fileSize"], 2048);
        assert_eq!(first["imageType"], "jpeg");
    }

    #[test]
    fn variant_lookup() {
        let result = sample();
        assert_eq!(result.variant("thumb").unwrap().filename, "abc@thumb.jpg");
        assert!(result.variant("large").is_none());
    }
}
