//! CLI output formatting.
//!
//! Each command has a `format_*` function returning lines (pure, testable)
//! and the binary prints them. JSON output bypasses this module entirely.
//!
//! # Output Format
//!
//! ## Ingest
//!
//! ```text
//! 3f2a9c0e1b7d4e55 (beach.jpg, 3 variants)
//! 001 large 1024x683 jpg 182.4 KB
//!     File: 3f/3f2a9c0e1b7d4e55@large.jpg
//! 002 original 4032x2688 jpg 2.1 MB
//!     File: 3f/3f2a9c0e1b7d4e55@original.jpg
//! 003 thumb 128x85 jpg 4.0 KB (private)
//!     File: 3f/3f2a9c0e1b7d4e55@thumb.jpg
//! ```
//!
//! Variants are listed by suffix; the store does not keep an order.
//!
//! ## Locate
//!
//! ```text
//! files/3f/3f2a9c0e1b7d4e55@thumb.jpg
//!     Type: image/jpeg
//! ```

use crate::imaging::mime_type_for_filename;
use crate::storage::ShardLayout;
use crate::types::ImageConversionResult;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Human-readable byte count.
fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

/// Path relative to the store root, for display.
fn relative_path(layout: &ShardLayout, filename: &str) -> String {
    let full = layout.file_path(filename);
    full.strip_prefix(layout.root())
        .unwrap_or(&full)
        .display()
        .to_string()
}

pub fn format_ingest_output(result: &ImageConversionResult, layout: &ShardLayout) -> Vec<String> {
    let mut variants: Vec<_> = result.size_formats.iter().collect();
    variants.sort_by(|a, b| a.format_name.cmp(&b.format_name));

    let plural = if variants.len() == 1 { "" } else { "s" };
    let mut lines = vec![format!(
        "{} ({}, {} variant{})",
        result.id_name,
        result.original_filename,
        variants.len(),
        plural
    )];

    for (i, variant) in variants.iter().enumerate() {
        let private = if variant.private { " (private)" } else { "" };
        lines.push(format!(
            "{} {} {}x{} {} {}{}",
            format_index(i + 1),
            variant.format_name,
            variant.image_size.width,
            variant.image_size.height,
            variant.image_type.extension(),
            format_size(variant.file_size),
            private
        ));
        lines.push(format!("    File: {}", relative_path(layout, &variant.filename)));
    }
    lines
}

pub fn format_locate_output(path: &Path, filename: &str) -> Vec<String> {
    vec![
        path.display().to_string(),
        format!("    Type: {}", mime_type_for_filename(filename)),
    ]
}

pub fn format_remove_output(removed: &[String], failed: &[(String, String)]) -> Vec<String> {
    let mut lines: Vec<String> = removed.iter().map(|f| format!("Removed {f}")).collect();
    lines.extend(failed.iter().map(|(f, reason)| format!("Failed {f}: {reason}")));
    lines
}
