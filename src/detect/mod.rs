//! Color segmentation, contour extraction, and shape matching.
//!
//! Everything here is pure pixel work over `image` buffers: convert the
//! frame to HLS, mask the threshold range, trace external contours, score
//! the plausible ones against the target template, and draw the
//! diagnostic overlays.

pub mod annotate;
pub mod contour;
pub mod mask;
pub mod shape;
pub mod template;

pub use contour::{find_external_contours, Contour, Rect};
pub use mask::{in_range, mask_to_rgb, rgb_to_hls};
pub use template::TargetTemplate;

/// Plausible-target bounding-box bounds, in pixels. Fixed by the target
/// geometry, deliberately not tunable.
pub const MIN_TARGET_WIDTH: u32 = 50;
pub const MAX_TARGET_WIDTH: u32 = 500;
pub const MIN_TARGET_HEIGHT: u32 = 10;
pub const MAX_TARGET_HEIGHT: u32 = 300;

/// Size filter applied before shape scoring. Bounds are inclusive.
pub fn plausible_target_size(bbox: Rect) -> bool {
    (MIN_TARGET_WIDTH..=MAX_TARGET_WIDTH).contains(&bbox.width)
        && (MIN_TARGET_HEIGHT..=MAX_TARGET_HEIGHT).contains(&bbox.height)
}

/// Pick the surviving contour most similar to the template (minimum shape
/// distance, no cutoff). Returns `None` only for an empty survivor set.
pub fn select_candidate<'a>(
    survivors: &[&'a Contour],
    template: &TargetTemplate,
) -> Option<&'a Contour> {
    survivors
        .iter()
        .filter_map(|c| template.distance_to(c).map(|d| (*c, d)))
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(c, _)| c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(width: u32, height: u32) -> Rect {
        Rect {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    #[test]
    fn size_filter_is_exact_at_lower_bounds() {
        assert!(!plausible_target_size(rect(49, 100)));
        assert!(plausible_target_size(rect(50, 100)));
        assert!(!plausible_target_size(rect(100, 9)));
        assert!(plausible_target_size(rect(100, 10)));
    }

    #[test]
    fn size_filter_is_exact_at_upper_bounds() {
        assert!(plausible_target_size(rect(500, 100)));
        assert!(!plausible_target_size(rect(501, 100)));
        assert!(plausible_target_size(rect(100, 300)));
        assert!(!plausible_target_size(rect(100, 301)));
    }
}
