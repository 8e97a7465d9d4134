//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//! Derived sides are rounded half-to-even so that sizes like 480.5 land on an
//! even pixel count, which compresses more predictably.

/// Given two sides and a new length for the first, compute the second so the
/// `side1 / side2` ratio is kept.
///
/// Never returns 0: an extreme aspect ratio collapses to a 1px side instead.
pub fn calculate_other_side(side1: f64, side2: f64, new_side1: f64) -> u32 {
    let other = (new_side1 / (side1 / side2)).round_ties_even();
    (other as u32).max(1)
}

/// Compute the shorter side after scaling so the longer side becomes
/// `new_long_side`.
///
/// The argument order does not matter; the longer of the two is used as the
/// reference side.
///
/// # Examples
/// ```
/// # use pixel_depot::imaging::calculate_shorter_dimension;
/// assert_eq!(calculate_shorter_dimension(1024, 768, 640), 480);
/// assert_eq!(calculate_shorter_dimension(768, 1024, 640), 480);
/// assert_eq!(calculate_shorter_dimension(1024, 1024, 640), 640);
/// ```
pub fn calculate_shorter_dimension(side1: u32, side2: u32, new_long_side: u32) -> u32 {
    let (longer, shorter) = if side1 > side2 {
        (side1, side2)
    } else {
        (side2, side1)
    };
    calculate_other_side(longer as f64, shorter as f64, new_long_side as f64)
}

/// Dimensions for a scale-by-longest-side resize.
///
/// The new longest side goes to whichever axis was longer in the source.
/// Squares put it on the height, which is the same thing.
pub fn scale_dimensions(source: (u32, u32), longest_side: u32) -> (u32, u32) {
    let (width, height) = source;
    let shorter = calculate_shorter_dimension(width, height, longest_side);

    if width > height {
        (longest_side, shorter)
    } else {
        (shorter, longest_side)
    }
}

/// Dimensions for a scale-by-width resize.
///
/// `rotated` means the stored pixels are displayed turned by 90°, so the
/// visual width is the stored height. In that case the target is applied to
/// the height axis and the width is derived from it.
pub fn scale_by_width_dimensions(source: (u32, u32), new_width: u32, rotated: bool) -> (u32, u32) {
    let (width, height) = (source.0 as f64, source.1 as f64);

    if rotated {
        let new_x = calculate_other_side(height, width, new_width as f64);
        (new_x, new_width)
    } else {
        let new_y = calculate_other_side(width, height, new_width as f64);
        (new_width, new_y)
    }
}

/// Dimensions for a thumbnail bounded by a `bound × bound` square.
///
/// Sources already inside the bound keep their size (no upscaling). Otherwise
/// the width is clamped first, then the height, each time shrinking the other
/// axis proportionally with integer truncation.
pub fn thumbnail_dimensions(source: (u32, u32), bound: u32) -> (u32, u32) {
    let (orig_w, orig_h) = source;
    if orig_w <= bound && orig_h <= bound {
        return source;
    }

    let (mut w, mut h) = (orig_w as u64, orig_h as u64);
    let bound = bound as u64;

    if w > bound {
        h = (h * bound / w).max(1);
        w = bound;
    }
    if h > bound {
        w = (w * bound / h).max(1);
        h = bound;
    }

    (w as u32, h as u32)
}
