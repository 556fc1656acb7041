//! Shared test utilities: synthetic masks and hand-placed bubbles.

use image::{GrayImage, Luma};

use crate::detector::{Bubble, BubbleSource};
use crate::grouping::QuestionRow;

const INK: Luma<u8> = Luma([255]);

/// Radius of every bubble produced by the helpers below.
pub(crate) const TEST_RADIUS: f64 = 12.0;

/// Binary mask with solid disks and 2 px thick rings.
pub(crate) fn draw_disks(
    w: u32,
    h: u32,
    filled: &[([f64; 2], f64)],
    hollow: &[([f64; 2], f64)],
) -> GrayImage {
    let mut img = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let dist = |c: [f64; 2]| ((x as f64 - c[0]).powi(2) + (y as f64 - c[1]).powi(2)).sqrt();
            let solid = filled.iter().any(|&(c, r)| dist(c) <= r);
            let ring = hollow.iter().any(|&(c, r)| {
                let d = dist(c);
                d >= r - 2.0 && d <= r
            });
            if solid || ring {
                img.put_pixel(x, y, INK);
            }
        }
    }
    img
}

/// Mask with the (even-odd) interior of `poly` set.
pub(crate) fn fill_polygon_mask(w: u32, h: u32, poly: &[[f64; 2]]) -> GrayImage {
    let mut img = GrayImage::new(w, h);
    let n = poly.len();
    for y in 0..h {
        let py = y as f64 + 0.5;
        for x in 0..w {
            let px = x as f64 + 0.5;
            let mut inside = false;
            for i in 0..n {
                let a = poly[i];
                let b = poly[(i + 1) % n];
                if (a[1] > py) != (b[1] > py) {
                    let cross_x = a[0] + (py - a[1]) * (b[0] - a[0]) / (b[1] - a[1]);
                    if px < cross_x {
                        inside = !inside;
                    }
                }
            }
            if inside {
                img.put_pixel(x, y, INK);
            }
        }
    }
    img
}

/// Circle-pass bubble with radius [`TEST_RADIUS`], marked above 0.3.
pub(crate) fn bubble_at(x: f64, y: f64, fill: f64) -> Bubble {
    Bubble {
        center: [x, y],
        radius: TEST_RADIUS,
        fill_rate: fill,
        filled: fill > 0.3,
        source: BubbleSource::Circle,
        contour: None,
    }
}

/// Row-major grid of bubbles; `(question, choice)` pairs in `marked` get fill 0.9.
pub(crate) fn grid_bubbles(
    questions: usize,
    alternatives: usize,
    origin: [f64; 2],
    pitch: [f64; 2],
    marked: &[(usize, usize)],
) -> Vec<Bubble> {
    let mut out = Vec::with_capacity(questions * alternatives);
    for q in 0..questions {
        for c in 0..alternatives {
            let fill = if marked.contains(&(q, c)) { 0.9 } else { 0.0 };
            out.push(bubble_at(
                origin[0] + c as f64 * pitch[0],
                origin[1] + q as f64 * pitch[1],
                fill,
            ));
        }
    }
    out
}

/// One question row at y = 50 with the given fill rates, 40 px apart.
pub(crate) fn row_with_fills(fills: &[f64]) -> QuestionRow {
    QuestionRow(
        fills
            .iter()
            .enumerate()
            .map(|(i, &f)| bubble_at(100.0 + 40.0 * i as f64, 50.0, f))
            .collect(),
    )
}

/// Geometry of [`answer_sheet_mask`].
pub(crate) const SHEET_MARGIN: f64 = 40.0;
pub(crate) const SHEET_PITCH: [f64; 2] = [40.0, 45.0];

/// Width of one rendered question column.
pub(crate) fn sheet_column_width(alternatives: usize) -> u32 {
    (2.0 * SHEET_MARGIN + (alternatives as f64 - 1.0) * SHEET_PITCH[0]) as u32
}

/// Render a clean answer sheet: columns side by side, hollow rings for
/// empty choices and solid disks for marks.
///
/// `marks` holds one entry per question in global order.
pub(crate) fn answer_sheet_mask(
    per_column: &[usize],
    alternatives: usize,
    marks: &[Option<usize>],
) -> GrayImage {
    let cw = sheet_column_width(alternatives);
    let rows = per_column.iter().copied().max().unwrap_or(0).max(1);
    let h = (2.0 * SHEET_MARGIN + (rows as f64 - 1.0) * SHEET_PITCH[1]) as u32;
    let w = cw * per_column.len() as u32;

    let mut filled = Vec::new();
    let mut hollow = Vec::new();
    let mut q = 0usize;
    for (col, &count) in per_column.iter().enumerate() {
        let x0 = col as f64 * cw as f64 + SHEET_MARGIN;
        for row in 0..count {
            let y = SHEET_MARGIN + row as f64 * SHEET_PITCH[1];
            let mark = marks.get(q).copied().flatten();
            for c in 0..alternatives {
                let center = [x0 + c as f64 * SHEET_PITCH[0], y];
                if mark == Some(c) {
                    filled.push((center, TEST_RADIUS));
                } else {
                    hollow.push((center, TEST_RADIUS));
                }
            }
            q += 1;
        }
    }
    draw_disks(w, h, &filled, &hollow)
}
