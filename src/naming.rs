//! Stored filename convention.
//!
//! Every stored variant is named `{name}@{suffix}.{ext}`, or `{name}.{ext}`
//! when obfuscated. `name` is a random UUID shared by all non-obfuscated
//! variants of one upload:
//! - `3f2c…@thumb.jpg`: the thumbnail
//! - `3f2c…@large.png`: a caller-requested variant
//! - `9b1e….jpg`: an obfuscated variant with its own UUID and no suffix

use uuid::Uuid;

/// Separator between the shared name and the variant suffix.
pub const SUFFIX_SEPARATOR: char = '@';

/// Build a stored filename.
///
/// Obfuscated names drop the suffix so variants cannot be correlated.
pub fn make_filename(name: &str, suffix: &str, extension: &str, obfuscate: bool) -> String {
    if obfuscate {
        format!("{name}.{extension}")
    } else {
        format!("{name}{SUFFIX_SEPARATOR}{suffix}.{extension}")
    }
}

/// A fresh random name (UUID v4, hyphenated).
pub fn random_name() -> String {
    Uuid::new_v4().to_string()
}

/// Parts of a stored filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredName {
    pub name: String,
    /// `None` for obfuscated variants.
    pub suffix: Option<String>,
    pub extension: String,
}

/// Split a stored filename back into its parts.
///
/// Returns `None` when there is no extension, the name part is empty, or the
/// filename contains a path separator.
/// - `"abc@thumb.jpg"` → name="abc", suffix=Some("thumb"), extension="jpg"
/// - `"abc.jpg"` → name="abc", suffix=None, extension="jpg"
pub fn parse_stored_filename(filename: &str) -> Option<StoredName> {
    if filename.contains(['/', '\\']) {
        return None;
    }
    let (stem, extension) = filename.rsplit_once('.')?;
    let (name, suffix) = match stem.split_once(SUFFIX_SEPARATOR) {
        Some((name, suffix)) => (name, Some(suffix.to_string())),
        None => (stem, None),
    };
    if name.is_empty() || extension.is_empty() {
        return None;
    }
    Some(StoredName {
        name: name.to_string(),
        suffix,
        extension: extension.to_string(),
    })
}
