//! Color-space conversion and range masking.
//!
//! Detection runs in hue/lightness/saturation space: the hue of the target
//! pattern is stable under the lighting swings a competition field throws
//! at a camera, where raw RGB is not. Conversion follows the common 8-bit
//! convention (hue halved into 0..=180 so it fits a byte; lightness and
//! saturation scaled to 0..=255), which is also the scale the default
//! threshold bounds are expressed in.

use image::{GrayImage, Rgb, RgbImage};

use crate::ThresholdConfig;

/// Pixel value marking mask foreground.
pub const MASK_ON: u8 = 255;

/// A frame converted to hue/lightness/saturation, one byte per channel.
///
/// Channel order is (H, L, S): hue in 0..=180, lightness and saturation in
/// 0..=255.
pub struct HlsImage {
    pub width: u32,
    pub height: u32,
    data: Vec<[u8; 3]>,
}

impl HlsImage {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.data[(y * self.width + x) as usize]
    }
}

/// Convert an RGB frame to HLS.
pub fn rgb_to_hls(frame: &RgbImage) -> HlsImage {
    let (width, height) = frame.dimensions();
    let mut data = Vec::with_capacity((width * height) as usize);
    for &Rgb([r, g, b]) in frame.pixels() {
        data.push(hls_from_rgb(r, g, b));
    }
    HlsImage {
        width,
        height,
        data,
    }
}

fn hls_from_rgb(r: u8, g: u8, b: u8) -> [u8; 3] {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let light = (max + min) / 2.0;

    if delta <= f32::EPSILON {
        return [0, (light * 255.0).round() as u8, 0];
    }

    let sat = if light < 0.5 {
        delta / (max + min)
    } else {
        delta / (2.0 - max - min)
    };

    let mut hue = if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if hue < 0.0 {
        hue += 360.0;
    }

    [
        (hue / 2.0).round().min(180.0) as u8,
        (light * 255.0).round() as u8,
        (sat * 255.0).round() as u8,
    ]
}

/// Build a binary mask of the pixels whose H, L, and S each fall inside
/// the configured bounds (inclusive on both ends).
///
/// Each bound applies to its own channel: hue to [low_h, high_h],
/// lightness to [low_l, high_l], saturation to [low_s, high_s].
pub fn in_range(hls: &HlsImage, thresholds: &ThresholdConfig) -> GrayImage {
    let low = [
        clamp_channel(thresholds.low_h),
        clamp_channel(thresholds.low_l),
        clamp_channel(thresholds.low_s),
    ];
    let high = [
        clamp_channel(thresholds.high_h),
        clamp_channel(thresholds.high_l),
        clamp_channel(thresholds.high_s),
    ];

    GrayImage::from_fn(hls.width, hls.height, |x, y| {
        let p = hls.pixel(x, y);
        let inside = (0..3).all(|c| p[c] >= low[c] && p[c] <= high[c]);
        image::Luma([if inside { MASK_ON } else { 0 }])
    })
}

fn clamp_channel(bound: i64) -> u8 {
    bound.clamp(0, 255) as u8
}

/// Render a mask back into an RGB frame for the display-mask diagnostic
/// view.
pub fn mask_to_rgb(mask: &GrayImage) -> RgbImage {
    RgbImage::from_fn(mask.width(), mask.height(), |x, y| {
        let v = mask.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    })
}
