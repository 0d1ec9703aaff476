//! Diagnostic overlay drawing.
//!
//! All drawing happens directly on the working `RgbImage`; out-of-bounds
//! coordinates are clamped or skipped so annotation can never fail a
//! cycle.

use image::{Rgb, RgbImage};

use crate::detect::contour::{Contour, Rect};

/// Neutral overlay for every extracted contour.
pub const COLOR_GRAY: Rgb<u8> = Rgb([160, 160, 160]);
/// Highlight for contours surviving the size filter.
pub const COLOR_YELLOW: Rgb<u8> = Rgb([255, 255, 0]);
/// Bounding box of the selected candidate.
pub const COLOR_WHITE: Rgb<u8> = Rgb([255, 255, 255]);
/// Target midpoint marker.
pub const COLOR_RED: Rgb<u8> = Rgb([255, 0, 0]);

/// Plot a contour's border points.
pub fn draw_contour(image: &mut RgbImage, contour: &Contour, color: Rgb<u8>) {
    for &(x, y) in &contour.points {
        if x < image.width() && y < image.height() {
            image.put_pixel(x, y, color);
        }
    }
}

/// Draw a one-pixel hollow rectangle.
pub fn draw_hollow_rect(image: &mut RgbImage, rect: Rect, color: Rgb<u8>) {
    if image.width() == 0 || image.height() == 0 || rect.width == 0 || rect.height == 0 {
        return;
    }
    let left = rect.x.min(image.width() - 1);
    let top = rect.y.min(image.height() - 1);
    let right = (rect.x + rect.width - 1).min(image.width() - 1);
    let bottom = (rect.y + rect.height - 1).min(image.height() - 1);

    for x in left..=right {
        image.put_pixel(x, top, color);
        image.put_pixel(x, bottom, color);
    }
    for y in top..=bottom {
        image.put_pixel(left, y, color);
        image.put_pixel(right, y, color);
    }
}

/// Draw a filled circle; the marker the drive team looks for.
pub fn draw_filled_circle(image: &mut RgbImage, cx: i64, cy: i64, radius: i64, color: Rgb<u8>) {
    let r2 = radius * radius;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let x = cx + dx;
            let y = cy + dy;
            if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
                image.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}
