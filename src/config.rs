//! Store configuration.
//!
//! One [`StoreConfig`] value is built at startup and passed down; nothing in
//! the pipeline reads the environment or config files while processing.
//!
//! ## Layering
//!
//! 1. Stock defaults ([`StoreConfig::default`])
//! 2. `depot.toml` (or the file given with `--config`), merged key by key
//! 3. Environment overrides ([`StoreConfig::apply_env`])
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! root_path = "./files"       # Where variants are stored
//! shard_prefix_length = 2     # Characters of the filename used as shard dir
//!
//! [images]
//! jpeg_quality = 75           # JPEG quality (1-100)
//! thumbnail_size = 128        # Thumbnails fit in a square of this side
//! max_output_pixels = 50000000 # Largest scaled variant, in pixels
//!
//! [processing]
//! max_workers = 4             # Max parallel encoders (omit for auto = CPU cores)
//! ```
//!
//! ## Environment
//!
//! | Variable | Field | Accepted |
//! |---|---|---|
//! | `IMAGE_PATH` | `root_path` | any non-empty path |
//! | `JPEG_QUALITY` | `images.jpeg_quality` | 1–100 |
//! | `THUMBNAIL_SIZE` | `images.thumbnail_size` | 1–100 |
//! | `IMAGE_SUB_PATH_LENGTH` | `shard_prefix_length` | ≥ 1 |
//!
//! Values outside the accepted range are ignored with a warning and the
//! configured value stands.
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::Quality;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

pub const ENV_IMAGE_PATH: &str = "IMAGE_PATH";
pub const ENV_JPEG_QUALITY: &str = "JPEG_QUALITY";
pub const ENV_THUMBNAIL_SIZE: &str = "THUMBNAIL_SIZE";
pub const ENV_SHARD_LENGTH: &str = "IMAGE_SUB_PATH_LENGTH";

/// Largest thumbnail bound accepted from the environment.
const ENV_THUMBNAIL_MAX: u32 = 100;

/// Stock ceiling on the pixel count of a scaled variant.
pub const DEFAULT_MAX_OUTPUT_PIXELS: u64 = 50_000_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Store configuration loaded from `depot.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Root directory of the sharded store.
    pub root_path: PathBuf,
    /// Number of leading filename characters used as the shard directory.
    pub shard_prefix_length: usize,
    /// Encoding settings.
    pub images: ImagesConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("./files"),
            shard_prefix_length: 2,
            images: ImagesConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.images.jpeg_quality) {
            return Err(ConfigError::Validation(
                "images.jpeg_quality must be 1-100".into(),
            ));
        }
        if self.images.thumbnail_size == 0 {
            return Err(ConfigError::Validation(
                "images.thumbnail_size must be non-zero".into(),
            ));
        }
        if self.images.max_output_pixels == 0 {
            return Err(ConfigError::Validation(
                "images.max_output_pixels must be non-zero".into(),
            ));
        }
        if self.shard_prefix_length == 0 {
            return Err(ConfigError::Validation(
                "shard_prefix_length must be at least 1".into(),
            ));
        }
        if self.root_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation("root_path must not be empty".into()));
        }
        Ok(())
    }

    pub fn quality(&self) -> Quality {
        Quality::new(self.images.jpeg_quality)
    }

    /// Apply environment overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides from an arbitrary lookup.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(ENV_IMAGE_PATH).filter(|p| !p.is_empty()) {
            self.root_path = PathBuf::from(path);
        }

        if let Some(raw) = lookup(ENV_JPEG_QUALITY) {
            match raw.trim().parse::<u32>() {
                Ok(q) if (1..=100).contains(&q) => self.images.jpeg_quality = q,
                _ => warn!(var = ENV_JPEG_QUALITY, value = %raw, "Ignoring invalid override"),
            }
        }

        if let Some(raw) = lookup(ENV_THUMBNAIL_SIZE) {
            match raw.trim().parse::<u32>() {
                Ok(size) if (1..=ENV_THUMBNAIL_MAX).contains(&size) => {
                    self.images.thumbnail_size = size
                }
                _ => warn!(var = ENV_THUMBNAIL_SIZE, value = %raw, "Ignoring invalid override"),
            }
        }

        if let Some(raw) = lookup(ENV_SHARD_LENGTH) {
            match raw.trim().parse::<usize>() {
                Ok(len) if len >= 1 => self.shard_prefix_length = len,
                _ => warn!(var = ENV_SHARD_LENGTH, value = %raw, "Ignoring invalid override"),
            }
        }
    }
}

/// Encoding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// JPEG quality (1-100).
    pub jpeg_quality: u32,
    /// Side of the square every thumbnail fits in.
    pub thumbnail_size: u32,
    /// Scale requests planning a larger output than this are refused.
    pub max_output_pixels: u64,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 75,
            thumbnail_size: 128,
            max_output_pixels: DEFAULT_MAX_OUTPUT_PIXELS,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel encode/write workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_workers: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_workers
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(StoreConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<StoreConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: StoreConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file, then apply environment overrides.
///
/// A missing file means stock defaults. The result is validated after the
/// environment is applied.
pub fn load_config(path: &Path) -> Result<StoreConfig, ConfigError> {
    let mut config = resolve_config(load_raw_config(path)?)?;
    config.apply_env();
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `depot.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Pixel Depot Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Environment variables override this file:
#   IMAGE_PATH, JPEG_QUALITY, THUMBNAIL_SIZE, IMAGE_SUB_PATH_LENGTH
#
# Unknown keys will cause an error.

# Root directory of the image store.
root_path = "./files"

# Stored files are spread over sub-directories named after the first
# N characters of their filename.
shard_prefix_length = 2

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
[images]
# JPEG quality (1 = worst, 100 = best).
jpeg_quality = 75

# Every upload gets a thumbnail that fits in a square of this many pixels.
# Smaller sources are never upscaled.
thumbnail_size = 128

# Scale requests whose output would exceed this many pixels are skipped.
# Originals and thumbnails are never affected.
max_output_pixels = 50000000

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel encode/write workers. Omit to use all CPU cores.
# Values above the core count are clamped down.
# max_workers = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_values() {
        let config = StoreConfig::default();
        assert_eq!(config.root_path, PathBuf::from("./files"));
        assert_eq!(config.shard_prefix_length, 2);
        assert_eq!(config.images.jpeg_quality, 75);
        assert_eq!(config.images.thumbnail_size, 128);
        assert_eq!(config.images.max_output_pixels, DEFAULT_MAX_OUTPUT_PIXELS);
        assert_eq!(config.processing.max_workers, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_partial_config() {
        let config: StoreConfig = toml::from_str(
            r#"
[images]
jpeg_quality = 90
"#,
        )
        .unwrap();
        assert_eq!(config.images.jpeg_quality, 90);
        // Defaults preserved
        assert_eq!(config.images.thumbnail_size, 128);
        assert_eq!(config.shard_prefix_length, 2);
    }

    #[test]
    fn unknown_keys_rejected() {
        let result: Result<StoreConfig, _> = toml::from_str("jpeg_quality = 90");
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let mut config = StoreConfig::default();
        config.images.jpeg_quality = 0;
        assert!(config.validate().is_err());

        let mut config = StoreConfig::default();
        config.images.jpeg_quality = 101;
        assert!(config.validate().is_err());

        let mut config = StoreConfig::default();
        config.images.thumbnail_size = 0;
        assert!(config.validate().is_err());

        let mut config = StoreConfig::default();
        config.images.max_output_pixels = 0;
        assert!(config.validate().is_err());

        let mut config = StoreConfig::default();
        config.shard_prefix_length = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // Environment overrides
    // =========================================================================

    #[test]
    fn env_overrides_apply() {
        let mut config = StoreConfig::default();
        config.apply_env_with(env(&[
            (ENV_IMAGE_PATH, "/srv/images"),
            (ENV_JPEG_QUALITY, "90"),
            (ENV_THUMBNAIL_SIZE, "64"),
            (ENV_SHARD_LENGTH, "3"),
        ]));
        assert_eq!(config.root_path, PathBuf::from("/srv/images"));
        assert_eq!(config.images.jpeg_quality, 90);
        assert_eq!(config.images.thumbnail_size, 64);
        assert_eq!(config.shard_prefix_length, 3);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut config = StoreConfig::default();
        config.apply_env_with(env(&[
            (ENV_IMAGE_PATH, ""),
            (ENV_JPEG_QUALITY, "0"),
            (ENV_THUMBNAIL_SIZE, "256"),
            (ENV_SHARD_LENGTH, "zero"),
        ]));
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn env_quality_bounds() {
        for (raw, expected) in [("1", 1), ("100", 100), ("101", 75), ("-5", 75), ("abc", 75)] {
            let mut config = StoreConfig::default();
            config.apply_env_with(env(&[(ENV_JPEG_QUALITY, raw)]));
            assert_eq!(config.images.jpeg_quality, expected, "JPEG_QUALITY={raw}");
        }
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn resolve_config_defaults_without_overlay() {
        let config = resolve_config(None).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn resolve_config_merges_file_values() {
        let overlay: toml::Value = toml::from_str(
            r#"
root_path = "/data"
[processing]
max_workers = 2
"#,
        )
        .unwrap();
        let config = resolve_config(Some(overlay)).unwrap();
        assert_eq!(config.root_path, PathBuf::from("/data"));
        assert_eq!(config.processing.max_workers, Some(2));
        assert_eq!(config.images.jpeg_quality, 75);
    }

    #[test]
    fn load_raw_config_missing_file_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(load_raw_config(&tmp.path().join("depot.toml")).unwrap().is_none());
    }

    #[test]
    fn load_raw_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("depot.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(matches!(load_raw_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn invalid_file_value_fails_validation() {
        let overlay: toml::Value = toml::from_str("[images]\njpeg_quality = 0").unwrap();
        assert!(matches!(
            resolve_config(Some(overlay)),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let config: StoreConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    // =========================================================================
    // merge_toml / effective_threads
    // =========================================================================

    #[test]
    fn merge_toml_nested_tables() {
        let base: toml::Value = toml::from_str("[images]\njpeg_quality = 75\nthumbnail_size = 128").unwrap();
        let overlay: toml::Value = toml::from_str("[images]\nthumbnail_size = 64").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["images"]["jpeg_quality"].as_integer(), Some(75));
        assert_eq!(merged["images"]["thumbnail_size"].as_integer(), Some(64));
    }

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
        assert_eq!(
            effective_threads(&ProcessingConfig {
                max_workers: Some(99999)
            }),
            cores
        );
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_workers: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
        let config = ProcessingConfig {
            max_workers: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }
}
