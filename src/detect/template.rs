//! Target template loading.
//!
//! The template is the shape baseline every cycle scores candidates
//! against. It is extracted once at startup from a reference image of the
//! target pattern and immutable afterwards; an unreadable or featureless
//! reference image is a startup-time hard failure, the only one in the
//! detection path.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::RgbImage;

use crate::detect::contour::find_external_contours;
use crate::detect::mask::{in_range, rgb_to_hls};
use crate::detect::shape::shape_distance;
use crate::detect::Contour;
use crate::ThresholdConfig;

/// Immutable shape baseline for candidate scoring.
#[derive(Clone, Debug)]
pub struct TargetTemplate {
    hu: [f64; 7],
}

impl TargetTemplate {
    /// Load a reference image from disk and extract the template contour
    /// with the given thresholds.
    pub fn load(path: &Path, thresholds: &ThresholdConfig) -> Result<Self> {
        let reference = image::open(path)
            .with_context(|| format!("read target template {}", path.display()))?
            .to_rgb8();
        Self::from_image(&reference, thresholds)
            .with_context(|| format!("extract target template from {}", path.display()))
    }

    /// Extract the template from an already-decoded reference frame: the
    /// largest-area external contour of the thresholded image.
    pub fn from_image(reference: &RgbImage, thresholds: &ThresholdConfig) -> Result<Self> {
        let mask = in_range(&rgb_to_hls(reference), thresholds);
        let contours = find_external_contours(&mask);
        let best = contours
            .into_iter()
            .max_by(|a, b| a.area().total_cmp(&b.area()))
            .ok_or_else(|| anyhow!("reference image contains no in-threshold contour"))?;
        Self::from_contour(&best)
    }

    pub fn from_contour(contour: &Contour) -> Result<Self> {
        let hu = contour
            .moments()
            .hu_invariants()
            .ok_or_else(|| anyhow!("template contour has no area"))?;
        Ok(Self { hu })
    }

    /// Shape distance from a candidate contour to this template. Lower is
    /// more similar; `None` for a degenerate (area-less) candidate.
    pub fn distance_to(&self, contour: &Contour) -> Option<f64> {
        let hu = contour.moments().hu_invariants()?;
        Some(shape_distance(&self.hu, &hu))
    }
}
