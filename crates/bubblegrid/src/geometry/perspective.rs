//! Sheet-level perspective correction.
//!
//! The largest external contour of the binary mask is reduced to a
//! quadrilateral, its corners are mapped onto an axis-aligned rectangle and
//! both rasters are resampled through the resulting homography.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

use super::homography::{
    estimate_homography, matrix3_to_array, matrix3_to_row_major_f32, project,
};
use super::polygon::{self, Point};

/// Perspective correction controls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PerspectiveConfig {
    /// Run the stage at all.
    pub enable: bool,
    /// Douglas-Peucker tolerance as a fraction of the contour perimeter.
    pub approx_epsilon_frac: f64,
    /// Minimum quadrilateral area as a fraction of the image area.
    pub min_area_frac: f64,
}

impl Default for PerspectiveConfig {
    fn default() -> Self {
        Self {
            enable: true,
            approx_epsilon_frac: 0.02,
            min_area_frac: 0.2,
        }
    }
}

/// Which fallback produced the sheet quadrilateral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuadSource {
    Polygon,
    ConvexHull,
    BoundingBox,
}

/// What the perspective stage did, for reporting.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PerspectiveReport {
    pub corrected: bool,
    /// Source corners ordered TL, TR, BR, BL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corners: Option<[[f64; 2]; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quad_source: Option<QuadSource>,
    /// Source → corrected homography (row-major).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homography: Option<[[f64; 3]; 3]>,
    /// Size of the rasters handed to the rest of the pipeline.
    pub output_size: [u32; 2],
}

impl PerspectiveReport {
    fn untouched(size: [u32; 2]) -> Self {
        Self {
            corrected: false,
            corners: None,
            quad_source: None,
            homography: None,
            output_size: size,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PerspectiveOutcome {
    pub mask: GrayImage,
    pub color: Option<RgbImage>,
    pub report: PerspectiveReport,
}

/// Order four corners as TL, TR, BR, BL using coordinate sums and differences.
pub(crate) fn order_corners(pts: &[Point; 4]) -> [Point; 4] {
    let by = |key: &dyn Fn(&Point) -> f64, max: bool| -> Point {
        let mut best = pts[0];
        for p in &pts[1..] {
            let better = if max { key(p) > key(&best) } else { key(p) < key(&best) };
            if better {
                best = *p;
            }
        }
        best
    };
    let sum = |p: &Point| p[0] + p[1];
    let diff = |p: &Point| p[1] - p[0];
    [
        by(&sum, false),
        by(&diff, false),
        by(&sum, true),
        by(&diff, true),
    ]
}

fn largest_external_contour(mask: &GrayImage) -> Option<Contour<i32>> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            let area = polygon::area(&polygon::contour_points(&c));
            (area, c)
        })
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c)
}

fn as_quad(points: &[Point]) -> Option<[Point; 4]> {
    match points {
        [a, b, c, d] => Some([*a, *b, *c, *d]),
        _ => None,
    }
}

fn sheet_quad(contour: &[Point], epsilon_frac: f64) -> Option<([Point; 4], QuadSource)> {
    let epsilon = epsilon_frac * polygon::perimeter(contour);
    if let Some(q) = as_quad(&polygon::approximate_closed_polygon(contour, epsilon)) {
        return Some((q, QuadSource::Polygon));
    }
    let hull = polygon::convex_hull(contour);
    let hull_eps = epsilon_frac * polygon::perimeter(&hull);
    if let Some(q) = as_quad(&polygon::approximate_closed_polygon(&hull, hull_eps)) {
        return Some((q, QuadSource::ConvexHull));
    }
    let rect = polygon::bounding_rect(contour)?;
    Some((rect.corners(), QuadSource::BoundingBox))
}

/// Rectify the sheet. Never fails: any geometric problem yields the inputs
/// back with `corrected = false`.
pub fn correct_perspective(
    mask: &GrayImage,
    color: Option<&RgbImage>,
    config: &PerspectiveConfig,
) -> PerspectiveOutcome {
    let (w, h) = mask.dimensions();
    let untouched = || PerspectiveOutcome {
        mask: mask.clone(),
        color: color.cloned(),
        report: PerspectiveReport::untouched([w, h]),
    };
    if !config.enable || w == 0 || h == 0 {
        return untouched();
    }

    let Some(contour) = largest_external_contour(mask) else {
        tracing::debug!("perspective: no external contour, skipping");
        return untouched();
    };
    let points = polygon::contour_points(&contour);
    let Some((quad, source)) = sheet_quad(&points, config.approx_epsilon_frac) else {
        return untouched();
    };

    let quad_area = polygon::area(&quad);
    let image_area = w as f64 * h as f64;
    if quad_area < config.min_area_frac * image_area {
        tracing::debug!(
            "perspective: quad covers {:.1}% of the image, below {:.1}%; skipping",
            100.0 * quad_area / image_area,
            100.0 * config.min_area_frac
        );
        return untouched();
    }

    let [tl, tr, br, bl] = order_corners(&quad);
    let out_w = polygon::distance(br, bl).max(polygon::distance(tr, tl)) as u32;
    let out_h = polygon::distance(tr, br).max(polygon::distance(tl, bl)) as u32;
    if out_w < 2 || out_h < 2 {
        return untouched();
    }

    let dst = [
        [0.0, 0.0],
        [(out_w - 1) as f64, 0.0],
        [(out_w - 1) as f64, (out_h - 1) as f64],
        [0.0, (out_h - 1) as f64],
    ];
    let hmat = match estimate_homography(&[tl, tr, br, bl], &dst) {
        Ok(hm) => hm,
        Err(err) => {
            tracing::warn!("perspective: homography failed ({}), keeping original", err);
            return untouched();
        }
    };
    let corner_err = [tl, tr, br, bl]
        .iter()
        .zip(&dst)
        .map(|(s, d)| polygon::distance(project(&hmat, s[0], s[1]), *d))
        .fold(0.0f64, f64::max);
    if !(corner_err < 1.0) {
        tracing::warn!(
            "perspective: corners reproject {:.2}px off, keeping original",
            corner_err
        );
        return untouched();
    }
    let Some(projection) = Projection::from_matrix(matrix3_to_row_major_f32(&hmat)) else {
        tracing::warn!("perspective: projection not invertible, keeping original");
        return untouched();
    };

    let mut warped_mask = GrayImage::new(out_w, out_h);
    warp_into(
        mask,
        &projection,
        Interpolation::Nearest,
        Luma([0u8]),
        &mut warped_mask,
    );
    let warped_color = color.map(|c| {
        let mut out = RgbImage::new(out_w, out_h);
        warp_into(
            c,
            &projection,
            Interpolation::Bilinear,
            Rgb([0u8, 0, 0]),
            &mut out,
        );
        out
    });

    tracing::info!(
        "perspective: corrected {:?} quad {}x{} -> {}x{}",
        source,
        w,
        h,
        out_w,
        out_h
    );

    PerspectiveOutcome {
        mask: warped_mask,
        color: warped_color,
        report: PerspectiveReport {
            corrected: true,
            corners: Some([tl, tr, br, bl]),
            quad_source: Some(source),
            homography: Some(matrix3_to_array(&hmat)),
            output_size: [out_w, out_h],
        },
    }
}
