//! External contour extraction from binary masks.
//!
//! The mask is scanned for 8-connected foreground regions; each region
//! contributes exactly one contour, the ordered trace of its outer border
//! (Moore neighbourhood walk from the region's topmost-leftmost pixel).
//! Inner borders of holes are deliberately not reported.
//!
//! Raw spatial moments are accumulated over the filled region while it is
//! being labelled, so shape descriptors come for free with extraction.

use image::GrayImage;

use crate::detect::shape::Moments;

/// Axis-aligned bounding box in pixel coordinates. Width and height count
/// pixels, so a single-pixel region is 1x1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Midpoint of the box, rounded down to integer pixel coordinates.
    pub fn midpoint(&self) -> (i64, i64) {
        (
            self.x as i64 + self.width as i64 / 2,
            self.y as i64 + self.height as i64 / 2,
        )
    }
}

/// One external contour: the ordered outer-border points of a connected
/// foreground region, plus the region's bounding box and raw moments.
#[derive(Clone, Debug)]
pub struct Contour {
    pub points: Vec<(u32, u32)>,
    bbox: Rect,
    moments: Moments,
}

impl Contour {
    pub fn bounding_box(&self) -> Rect {
        self.bbox
    }

    /// Filled-region area in pixels.
    pub fn area(&self) -> f64 {
        self.moments.m00
    }

    pub fn moments(&self) -> &Moments {
        &self.moments
    }
}

/// Clockwise Moore neighbourhood, starting west.
const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
];

/// Extract the external contours of all 8-connected foreground regions.
///
/// Regions are reported in scan order (top to bottom, left to right by
/// their first pixel).
pub fn find_external_contours(mask: &GrayImage) -> Vec<Contour> {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let mut seen = vec![false; (width as usize) * (height as usize)];
    let mut contours = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let idx = (y as usize) * (width as usize) + (x as usize);
            if seen[idx] || !is_foreground(mask, x as i32, y as i32) {
                continue;
            }
            let (bbox, moments) = label_region(mask, &mut seen, x, y);
            let points = trace_outer_border(mask, x, y);
            contours.push(Contour {
                points,
                bbox,
                moments,
            });
        }
    }

    contours
}

fn is_foreground(mask: &GrayImage, x: i32, y: i32) -> bool {
    if x < 0 || y < 0 || x >= mask.width() as i32 || y >= mask.height() as i32 {
        return false;
    }
    mask.get_pixel(x as u32, y as u32).0[0] != 0
}

/// Flood-fill one region, marking it seen and accumulating its bounding
/// box and raw moments.
fn label_region(
    mask: &GrayImage,
    seen: &mut [bool],
    start_x: u32,
    start_y: u32,
) -> (Rect, Moments) {
    let width = mask.width() as usize;
    let mut stack = vec![(start_x, start_y)];
    seen[(start_y as usize) * width + (start_x as usize)] = true;

    let (mut min_x, mut max_x) = (start_x, start_x);
    let (mut min_y, mut max_y) = (start_y, start_y);
    let mut moments = Moments::default();

    while let Some((x, y)) = stack.pop() {
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
        moments.accumulate(x as f64, y as f64);

        for (dx, dy) in NEIGHBOURS {
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            if !is_foreground(mask, nx, ny) {
                continue;
            }
            let nidx = (ny as usize) * width + (nx as usize);
            if !seen[nidx] {
                seen[nidx] = true;
                stack.push((nx as u32, ny as u32));
            }
        }
    }

    let bbox = Rect {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    };
    (bbox, moments)
}

/// Walk the outer border clockwise from the region's topmost-leftmost
/// pixel. A lone pixel yields a single-point contour.
fn trace_outer_border(mask: &GrayImage, start_x: u32, start_y: u32) -> Vec<(u32, u32)> {
    let start = (start_x as i32, start_y as i32);
    let mut points = vec![(start_x, start_y)];

    // The start pixel was reached scanning from the west, so the first
    // neighbourhood sweep begins there.
    let Some((first_next, first_dir)) = next_border_step(mask, start, 0) else {
        return points; // isolated pixel
    };

    let mut current = first_next;
    let mut dir = first_dir;
    points.push((current.0 as u32, current.1 as u32));

    // Stop when the walk is back at the start pixel about to repeat its
    // first move (Jacob's criterion). The cap guards degenerate masks.
    let cap = (mask.width() as usize + 2) * (mask.height() as usize + 2) * 4;
    for _ in 0..cap {
        let backtrack_dir = (dir + 5) % 8;
        let Some((next, next_dir)) = next_border_step(mask, current, backtrack_dir) else {
            break;
        };
        if current == start && next == first_next && next_dir == first_dir {
            break;
        }
        current = next;
        dir = next_dir;
        points.push((current.0 as u32, current.1 as u32));
    }

    // The closing revisit of the start pixel is an artifact of the walk.
    if points.len() > 1 && points.last() == points.first() {
        points.pop();
    }

    points
}

/// Sweep the Moore neighbourhood clockwise from `from_dir`, returning the
/// first foreground neighbour and the direction it was found in.
fn next_border_step(
    mask: &GrayImage,
    (x, y): (i32, i32),
    from_dir: usize,
) -> Option<((i32, i32), usize)> {
    for step in 0..8 {
        let dir = (from_dir + step) % 8;
        let (dx, dy) = NEIGHBOURS[dir];
        let nx = x + dx;
        let ny = y + dy;
        if is_foreground(mask, nx, ny) {
            return Some(((nx, ny), dir));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn mask_with_rect(w: u32, h: u32, rect: Rect) -> GrayImage {
        let mut mask = GrayImage::new(w, h);
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        mask
    }

    #[test]
    fn empty_mask_yields_no_contours() {
        let mask = GrayImage::new(32, 32);
        assert!(find_external_contours(&mask).is_empty());
    }

    #[test]
    fn solid_rectangle_yields_one_contour_with_exact_bbox() {
        let rect = Rect {
            x: 5,
            y: 7,
            width: 12,
            height: 4,
        };
        let mask = mask_with_rect(32, 32, rect);
        let contours = find_external_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].bounding_box(), rect);
        assert_eq!(contours[0].area(), (12 * 4) as f64);
    }

    #[test]
    fn separate_blobs_yield_separate_contours() {
        let mut mask = mask_with_rect(
            64,
            64,
            Rect {
                x: 2,
                y: 2,
                width: 6,
                height: 6,
            },
        );
        for y in 20..30 {
            for x in 40..50 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let contours = find_external_contours(&mask);
        assert_eq!(contours.len(), 2);
    }

    #[test]
    fn diagonal_touch_is_one_region() {
        // 8-connectivity joins diagonal neighbours.
        let mut mask = GrayImage::new(8, 8);
        mask.put_pixel(1, 1, Luma([255]));
        mask.put_pixel(2, 2, Luma([255]));
        let contours = find_external_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(
            contours[0].bounding_box(),
            Rect {
                x: 1,
                y: 1,
                width: 2,
                height: 2
            }
        );
    }

    #[test]
    fn single_pixel_contour() {
        let mut mask = GrayImage::new(8, 8);
        mask.put_pixel(3, 4, Luma([255]));
        let contours = find_external_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].points, vec![(3, 4)]);
        assert_eq!(contours[0].area(), 1.0);
    }

    #[test]
    fn border_points_lie_on_the_region_boundary() {
        let rect = Rect {
            x: 4,
            y: 4,
            width: 8,
            height: 5,
        };
        let mask = mask_with_rect(24, 24, rect);
        let contour = &find_external_contours(&mask)[0];
        for &(x, y) in &contour.points {
            assert!(x >= rect.x && x < rect.x + rect.width);
            assert!(y >= rect.y && y < rect.y + rect.height);
            // Every traced point touches the rectangle's edge.
            let on_edge = x == rect.x
                || x == rect.x + rect.width - 1
                || y == rect.y
                || y == rect.y + rect.height - 1;
            assert!(on_edge, "interior point ({x},{y}) in border trace");
        }
    }

    #[test]
    fn touching_image_edge_is_handled() {
        let rect = Rect {
            x: 0,
            y: 0,
            width: 5,
            height: 3,
        };
        let mask = mask_with_rect(16, 16, rect);
        let contours = find_external_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].bounding_box(), rect);
    }

    #[test]
    fn midpoint_rounds_down() {
        let rect = Rect {
            x: 10,
            y: 20,
            width: 5,
            height: 4,
        };
        assert_eq!(rect.midpoint(), (12, 22));
    }
}
