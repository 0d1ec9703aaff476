//! Shape descriptors and similarity scoring.
//!
//! A contour's shape is summarised by the seven Hu moment invariants of
//! its filled region; the invariants are unchanged under translation,
//! scaling, and rotation, which is what lets a template extracted from a
//! reference image match the same pattern at a different distance and
//! angle on the field.
//!
//! The similarity score compares log-scaled invariants:
//! `sum_i |1/ma_i - 1/mb_i|` with `m_i = sign(h_i) * log10(|h_i|)`.
//! Lower means more alike; zero means indistinguishable descriptors.

/// Raw spatial moments up to third order, accumulated pixel by pixel over
/// a filled region.
#[derive(Clone, Copy, Debug, Default)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub m20: f64,
    pub m11: f64,
    pub m02: f64,
    pub m30: f64,
    pub m21: f64,
    pub m12: f64,
    pub m03: f64,
}

impl Moments {
    /// Fold one region pixel into the sums.
    pub fn accumulate(&mut self, x: f64, y: f64) {
        self.m00 += 1.0;
        self.m10 += x;
        self.m01 += y;
        self.m20 += x * x;
        self.m11 += x * y;
        self.m02 += y * y;
        self.m30 += x * x * x;
        self.m21 += x * x * y;
        self.m12 += x * y * y;
        self.m03 += y * y * y;
    }

    /// The seven Hu invariants of this region.
    ///
    /// Returns `None` for an empty region (no area, no shape).
    pub fn hu_invariants(&self) -> Option<[f64; 7]> {
        if self.m00 <= 0.0 {
            return None;
        }
        let cx = self.m10 / self.m00;
        let cy = self.m01 / self.m00;

        // Central moments.
        let mu20 = self.m20 - cx * self.m10;
        let mu11 = self.m11 - cx * self.m01;
        let mu02 = self.m02 - cy * self.m01;
        let mu30 = self.m30 - 3.0 * cx * self.m20 + 2.0 * cx * cx * self.m10;
        let mu21 = self.m21 - 2.0 * cx * self.m11 - cy * self.m20 + 2.0 * cx * cx * self.m01;
        let mu12 = self.m12 - 2.0 * cy * self.m11 - cx * self.m02 + 2.0 * cy * cy * self.m10;
        let mu03 = self.m03 - 3.0 * cy * self.m02 + 2.0 * cy * cy * self.m01;

        // Scale-normalised central moments.
        let norm2 = self.m00.powf(2.0);
        let norm3 = self.m00.powf(2.5);
        let n20 = mu20 / norm2;
        let n11 = mu11 / norm2;
        let n02 = mu02 / norm2;
        let n30 = mu30 / norm3;
        let n21 = mu21 / norm3;
        let n12 = mu12 / norm3;
        let n03 = mu03 / norm3;

        let h1 = n20 + n02;
        let h2 = (n20 - n02).powi(2) + 4.0 * n11 * n11;
        let h3 = (n30 - 3.0 * n12).powi(2) + (3.0 * n21 - n03).powi(2);
        let h4 = (n30 + n12).powi(2) + (n21 + n03).powi(2);
        let h5 = (n30 - 3.0 * n12)
            * (n30 + n12)
            * ((n30 + n12).powi(2) - 3.0 * (n21 + n03).powi(2))
            + (3.0 * n21 - n03) * (n21 + n03) * (3.0 * (n30 + n12).powi(2) - (n21 + n03).powi(2));
        let h6 = (n20 - n02) * ((n30 + n12).powi(2) - (n21 + n03).powi(2))
            + 4.0 * n11 * (n30 + n12) * (n21 + n03);
        let h7 = (3.0 * n21 - n03)
            * (n30 + n12)
            * ((n30 + n12).powi(2) - 3.0 * (n21 + n03).powi(2))
            - (n30 - 3.0 * n12) * (n21 + n03) * (3.0 * (n30 + n12).powi(2) - (n21 + n03).powi(2));

        Some([h1, h2, h3, h4, h5, h6, h7])
    }
}

/// Invariants below this magnitude are treated as numerical noise and
/// skipped when scoring.
const HU_EPSILON: f64 = 1.0e-7;

/// Distance between two Hu descriptors. Lower is more similar.
pub fn shape_distance(a: &[f64; 7], b: &[f64; 7]) -> f64 {
    let mut total = 0.0;
    for i in 0..7 {
        let (ha, hb) = (a[i], b[i]);
        if ha.abs() < HU_EPSILON || hb.abs() < HU_EPSILON {
            continue;
        }
        let ma = ha.signum() * ha.abs().log10();
        let mb = hb.signum() * hb.abs().log10();
        total += (1.0 / ma - 1.0 / mb).abs();
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moments_of_rect(x0: u32, y0: u32, w: u32, h: u32) -> Moments {
        let mut m = Moments::default();
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                m.accumulate(x as f64, y as f64);
            }
        }
        m
    }

    fn moments_of_right_triangle(x0: u32, y0: u32, size: u32) -> Moments {
        let mut m = Moments::default();
        for y in 0..size {
            for x in 0..=y {
                m.accumulate((x0 + x) as f64, (y0 + y) as f64);
            }
        }
        m
    }

    #[test]
    fn empty_region_has_no_descriptor() {
        assert!(Moments::default().hu_invariants().is_none());
    }

    #[test]
    fn area_matches_pixel_count() {
        let m = moments_of_rect(3, 4, 10, 6);
        assert_eq!(m.m00, 60.0);
    }

    #[test]
    fn invariants_are_translation_invariant() {
        let a = moments_of_rect(0, 0, 20, 8).hu_invariants().unwrap();
        let b = moments_of_rect(100, 50, 20, 8).hu_invariants().unwrap();
        for i in 0..7 {
            assert!((a[i] - b[i]).abs() < 1.0e-12, "invariant {i} shifted");
        }
        assert!(shape_distance(&a, &b) < 1.0e-9);
    }

    #[test]
    fn invariants_are_nearly_scale_invariant() {
        let small = moments_of_rect(0, 0, 20, 10).hu_invariants().unwrap();
        let large = moments_of_rect(0, 0, 200, 100).hu_invariants().unwrap();
        // Discretisation leaves a small residual; it must stay tiny
        // compared with a genuinely different shape.
        assert!(shape_distance(&small, &large) < 0.05);
    }

    #[test]
    fn similar_shape_beats_dissimilar_shape() {
        let template = moments_of_rect(0, 0, 40, 16).hu_invariants().unwrap();
        let scaled_copy = moments_of_rect(0, 0, 80, 32).hu_invariants().unwrap();
        let triangle = moments_of_right_triangle(0, 0, 60).hu_invariants().unwrap();
        let copy_distance = shape_distance(&template, &scaled_copy);
        let decoy_distance = shape_distance(&template, &triangle);
        assert!(
            copy_distance < decoy_distance,
            "copy {copy_distance} should score below decoy {decoy_distance}"
        );
    }

    #[test]
    fn identical_descriptors_score_zero() {
        let m = moments_of_rect(5, 5, 12, 30).hu_invariants().unwrap();
        assert_eq!(shape_distance(&m, &m), 0.0);
    }
}
