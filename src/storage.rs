//! Sharded on-disk layout for stored variants.
//!
//! A variant named `abcdef@thumb.jpg` lives at `{root}/ab/abcdef@thumb.jpg`
//! with the default shard length of 2. The shard is always taken from the
//! final filename, so obfuscated variants of one upload usually land in
//! different directories.
//!
//! Directory handling must be safe to race: every variant of a batch calls
//! [`ShardLayout::ensure_dir`] concurrently, often for the same shard.
//! Creation is recursive and treats "already exists" as success, so no lock is
//! needed.

use crate::config::StoreConfig;
use crate::error::Error;
use crate::imaging::ImageFormat;
use crate::naming::{make_filename, parse_stored_filename, random_name};
use crate::types::{ImageConversionResult, ImageSizeFormat};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Mode for newly created shard directories.
#[cfg(unix)]
const DIR_MODE: u32 = 0o740;

/// Root directory plus shard prefix length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardLayout {
    root: PathBuf,
    shard_len: usize,
}

impl ShardLayout {
    /// A shard length of 0 is treated as 1.
    pub fn new(root: impl Into<PathBuf>, shard_len: usize) -> Self {
        Self {
            root: root.into(),
            shard_len: shard_len.max(1),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.root_path.clone(), config.shard_prefix_length)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Shard name for a filename: its first K characters, or the whole name
    /// when it is shorter.
    pub fn shard<'a>(&self, filename: &'a str) -> &'a str {
        match filename.char_indices().nth(self.shard_len) {
            Some((end, _)) => &filename[..end],
            None => filename,
        }
    }

    /// Directory a filename is stored in.
    pub fn image_dir(&self, filename: &str) -> PathBuf {
        self.root.join(self.shard(filename))
    }

    /// Full path of a stored filename.
    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.image_dir(filename).join(filename)
    }

    /// Full path of a caller-supplied variant filename.
    ///
    /// Only names following the stored convention with a storable extension
    /// are accepted, so a filename can never point outside its shard.
    pub fn locate(&self, filename: &str) -> Result<PathBuf, Error> {
        let stored = parse_stored_filename(filename)
            .filter(|stored| ImageFormat::from_extension(&stored.extension).is_some())
            .ok_or_else(|| Error::storage(format!("'{filename}' is not a stored variant name")))?;
        debug!(name = %stored.name, suffix = ?stored.suffix, "Locating variant");
        Ok(self.file_path(filename))
    }

    /// Make sure `dir` exists and the owner can read and write it.
    ///
    /// Missing directories are created with their parents. An existing
    /// directory the owner cannot use is an error.
    pub fn ensure_dir(dir: &Path) -> Result<(), Error> {
        match fs::metadata(dir) {
            Ok(meta) => {
                if !meta.is_dir() {
                    return Err(Error::storage(format!(
                        "{} exists and is not a directory",
                        dir.display()
                    )));
                }
                if !owner_can_read_write(&meta) {
                    return Err(Error::storage(format!(
                        "{} is not readable and writable by its owner",
                        dir.display()
                    )));
                }
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "Creating shard directory");
                create_dir(dir).map_err(|e| {
                    Error::storage(format!("cannot create {}", dir.display())).with_source(e)
                })
            }
            Err(e) => Err(Error::storage(format!("cannot inspect {}", dir.display())).with_source(e)),
        }
    }

    /// Ensure the shard directory for `filename` and return its full path.
    pub fn prepare(&self, filename: &str) -> Result<PathBuf, Error> {
        let dir = self.image_dir(filename);
        Self::ensure_dir(&dir)?;
        Ok(dir.join(filename))
    }

    /// Delete one stored variant.
    pub fn delete_variant(&self, filename: &str) -> Result<(), Error> {
        let path = self.locate(filename)?;
        fs::remove_file(&path)
            .map_err(|e| Error::storage(format!("cannot delete {}", path.display())).with_source(e))
    }

    /// Delete every variant of a stored result.
    ///
    /// All deletions are attempted; failures are logged and returned.
    pub fn rollback_result(&self, result: &ImageConversionResult) -> Vec<Error> {
        result
            .size_formats
            .iter()
            .filter_map(|variant| {
                self.delete_variant(&variant.filename)
                    .inspect_err(|e| warn!(filename = %variant.filename, error = %e, "Rollback delete failed"))
                    .err()
            })
            .collect()
    }

    /// Move a stored variant to a new name and return that name.
    ///
    /// Obfuscating gives the variant a fresh random name without a suffix.
    /// Otherwise it is renamed to `{id_name}@{suffix}`.
    pub fn rename_variant(
        &self,
        variant: &ImageSizeFormat,
        id_name: &str,
        obfuscate: bool,
    ) -> Result<String, Error> {
        let base = if obfuscate {
            random_name()
        } else {
            id_name.to_string()
        };
        let new_filename = make_filename(
            &base,
            &variant.format_name,
            variant.image_type.extension(),
            obfuscate,
        );

        let from = self.file_path(&variant.filename);
        let to = self.prepare(&new_filename)?;
        fs::rename(&from, &to).map_err(|e| {
            Error::storage(format!("cannot move {} to {}", from.display(), to.display()))
                .with_source(e)
        })?;

        debug!(from = %variant.filename, to = %new_filename, "Renamed variant");
        Ok(new_filename)
    }
}

fn create_dir(dir: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder.create(dir)
}

#[cfg(unix)]
fn owner_can_read_write(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o600 == 0o600
}

#[cfg(not(unix))]
fn owner_can_read_write(meta: &fs::Metadata) -> bool {
    !meta.permissions().readonly()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::ImageSize;
    use tempfile::TempDir;

    fn variant(filename: &str, format_name: &str) -> ImageSizeFormat {
        ImageSizeFormat {
            format_name: format_name.into(),
            filename: filename.into(),
            image_size: ImageSize {
                width: 1,
                height: 1,
            },
            file_size: 1,
            image_type: ImageFormat::Jpeg,
            private: false,
        }
    }

    fn store(layout: &ShardLayout, filename: &str) {
        let path = layout.prepare(filename).unwrap();
        fs::write(path, b"x").unwrap();
    }

    // =========================================================================
    // Paths
    // =========================================================================

    #[test]
    fn shard_is_filename_prefix() {
        let layout = ShardLayout::new("/files", 2);
        assert_eq!(layout.shard("abc123@thumb.jpg"), "ab");
        assert_eq!(layout.image_dir("abc123@thumb.jpg"), PathBuf::from("/files/ab"));
        assert_eq!(
            layout.file_path("abc123@thumb.jpg"),
            PathBuf::from("/files/ab/abc123@thumb.jpg")
        );
    }

    #[test]
    fn short_filename_is_its_own_shard() {
        let layout = ShardLayout::new("/files", 4);
        assert_eq!(layout.shard("abc"), "abc");
        assert_eq!(layout.shard("abcd"), "abcd");
    }

    #[test]
    fn shard_counts_characters_not_bytes() {
        let layout = ShardLayout::new("/files", 2);
        assert_eq!(layout.shard("éclair.jpg"), "éc");
    }

    #[test]
    fn zero_shard_length_means_one() {
        let layout = ShardLayout::new("/files", 0);
        assert_eq!(layout.shard("abc"), "a");
    }

    // =========================================================================
    // Directories
    // =========================================================================

    #[test]
    fn ensure_dir_creates_nested() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("deep/er/ab");
        ShardLayout::ensure_dir(&dir).unwrap();
        assert!(dir.is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&dir).unwrap().permissions().mode();
            assert_eq!(mode & 0o700, 0o700);
        }
    }

    #[test]
    fn ensure_dir_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("ab");
        ShardLayout::ensure_dir(&dir).unwrap();
        ShardLayout::ensure_dir(&dir).unwrap();
    }

    #[test]
    fn ensure_dir_tolerates_concurrent_callers() {
        use rayon::prelude::*;

        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("shared/ab");
        let results: Vec<_> = (0..16)
            .into_par_iter()
            .map(|_| ShardLayout::ensure_dir(&dir))
            .collect();
        assert!(results.iter().all(Result::is_ok));
    }

    #[test]
    fn ensure_dir_rejects_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ab");
        fs::write(&path, b"x").unwrap();
        let err = ShardLayout::ensure_dir(&path).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Storage);
    }

    #[cfg(unix)]
    #[test]
    fn ensure_dir_rejects_owner_readonly() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("ab");
        fs::create_dir(&dir).unwrap();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o500)).unwrap();

        assert!(ShardLayout::ensure_dir(&dir).is_err());
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o700)).unwrap();
    }

    #[test]
    fn locate_accepts_stored_names() {
        let layout = ShardLayout::new("/store", 2);
        assert_eq!(
            layout.locate("abc@thumb.jpg").unwrap(),
            PathBuf::from("/store/ab/abc@thumb.jpg")
        );
        assert_eq!(layout.locate("xyz.tiff").unwrap(), PathBuf::from("/store/xy/xyz.tiff"));
    }

    #[test]
    fn locate_rejects_foreign_names() {
        let layout = ShardLayout::new("/store", 2);
        for filename in ["../../etc/passwd.jpg", "ab/cd@thumb.jpg", "notes.txt", "noext", "@thumb.jpg"] {
            let err = layout.locate(filename).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Storage, "{filename}");
        }
    }

    // =========================================================================
    // Delete / rollback / rename
    // =========================================================================

    #[test]
    fn delete_variant_removes_file() {
        let tmp = TempDir::new().unwrap();
        let layout = ShardLayout::new(tmp.path(), 2);
        store(&layout, "abc@thumb.jpg");

        layout.delete_variant("abc@thumb.jpg").unwrap();
        assert!(!layout.file_path("abc@thumb.jpg").exists());
        assert!(layout.delete_variant("abc@thumb.jpg").is_err());
    }

    #[test]
    fn delete_variant_refuses_paths() {
        let tmp = TempDir::new().unwrap();
        let layout = ShardLayout::new(tmp.path().join("store"), 2);
        let outside = tmp.path().join("keep.jpg");
        fs::write(&outside, b"x").unwrap();

        assert!(layout.delete_variant("../keep.jpg").is_err());
        assert!(outside.exists());
    }

    #[test]
    fn rollback_result_deletes_everything_and_reports_misses() {
        let tmp = TempDir::new().unwrap();
        let layout = ShardLayout::new(tmp.path(), 2);
        store(&layout, "abc@thumb.jpg");
        store(&layout, "xyz.jpg");

        let result = ImageConversionResult {
            id_name: "abc".into(),
            original_filename: "cat.jpg".into(),
            size_formats: vec![
                variant("abc@thumb.jpg", "thumb"),
                variant("abc@gone.jpg", "gone"),
                variant("xyz.jpg", "large"),
            ],
        };

        let errors = layout.rollback_result(&result);
        assert_eq!(errors.len(), 1);
        assert!(!layout.file_path("abc@thumb.jpg").exists());
        assert!(!layout.file_path("xyz.jpg").exists());
    }

    #[test]
    fn rename_variant_to_id_name() {
        let tmp = TempDir::new().unwrap();
        let layout = ShardLayout::new(tmp.path(), 2);
        store(&layout, "old.jpg");

        let renamed = layout
            .rename_variant(&variant("old.jpg", "large"), "newid", false)
            .unwrap();
        assert_eq!(renamed, "newid@large.jpg");
        assert!(layout.file_path("newid@large.jpg").exists());
        assert!(!layout.file_path("old.jpg").exists());
    }

    #[test]
    fn rename_variant_obfuscated_gets_random_name() {
        let tmp = TempDir::new().unwrap();
        let layout = ShardLayout::new(tmp.path(), 2);
        store(&layout, "abc@large.jpg");

        let renamed = layout
            .rename_variant(&variant("abc@large.jpg", "large"), "abc", true)
            .unwrap();
        assert!(!renamed.contains('@'));
        assert!(renamed.ends_with(".jpg"));
        assert!(layout.file_path(&renamed).exists());
    }

    #[test]
    fn rename_missing_variant_errors() {
        let tmp = TempDir::new().unwrap();
        let layout = ShardLayout::new(tmp.path(), 2);
        assert!(
            layout
                .rename_variant(&variant("nope.jpg", "large"), "abc", false)
                .is_err()
        );
    }
}
