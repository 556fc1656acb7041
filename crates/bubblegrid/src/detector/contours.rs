//! Contour-shape fallback: roughly round closed borders of bubble size.

use image::GrayImage;
use imageproc::contours::find_contours;

use crate::geometry::polygon::{self, Point};

/// Contour pass shape gates.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ContourPassConfig {
    pub min_area: f64,
    pub max_area: f64,
    /// Minimum `4π·area / perimeter²`.
    pub min_circularity: f64,
    /// Bounding-box `w / h` must lie in `[aspect_min, aspect_max]`.
    pub aspect_min: f64,
    pub aspect_max: f64,
}

impl Default for ContourPassConfig {
    fn default() -> Self {
        Self {
            min_area: 100.0,
            max_area: 900.0,
            min_circularity: 0.7,
            aspect_min: 0.7,
            aspect_max: 1.3,
        }
    }
}

/// A contour that passed the shape gates.
#[derive(Debug, Clone)]
pub(crate) struct ContourHit {
    pub center: [f64; 2],
    pub radius: f64,
    pub polygon: Vec<Point>,
}

/// All borders (outer and hole) that look like a bubble.
pub(crate) fn round_contours(mask: &GrayImage, cfg: &ContourPassConfig) -> Vec<ContourHit> {
    let mut hits = Vec::new();
    for contour in find_contours::<i32>(mask) {
        let pts = polygon::contour_points(&contour);
        let area = polygon::area(&pts);
        if area < cfg.min_area || area > cfg.max_area {
            continue;
        }
        let perimeter = polygon::perimeter(&pts);
        if perimeter <= 0.0 {
            continue;
        }
        let circularity = 4.0 * std::f64::consts::PI * area / (perimeter * perimeter);
        if circularity < cfg.min_circularity {
            continue;
        }
        let Some(rect) = polygon::bounding_rect(&pts) else {
            continue;
        };
        let aspect = rect.w / rect.h;
        if aspect < cfg.aspect_min || aspect > cfg.aspect_max {
            continue;
        }
        let center = polygon::centroid(&pts).unwrap_or_else(|| rect.center());
        hits.push(ContourHit {
            center,
            radius: (rect.w + rect.h) / 4.0,
            polygon: pts,
        });
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::draw_disks;

    #[test]
    fn disk_passes_shape_gates() {
        let mask = draw_disks(60, 60, &[([30.0, 30.0], 12.0)], &[]);
        let hits = round_contours(&mask, &ContourPassConfig::default());
        assert_eq!(hits.len(), 1);
        let h = &hits[0];
        assert!((h.center[0] - 30.0).abs() < 1.0 && (h.center[1] - 30.0).abs() < 1.0);
        assert!((h.radius - 12.5).abs() < 1.0, "radius {}", h.radius);
    }

    #[test]
    fn elongated_and_tiny_shapes_are_rejected() {
        let bar = GrayImage::from_fn(80, 40, |x, y| {
            image::Luma([if (10..70).contains(&x) && (15..25).contains(&y) { 255 } else { 0 }])
        });
        assert!(round_contours(&bar, &ContourPassConfig::default()).is_empty());
        let dot = draw_disks(40, 40, &[([20.0, 20.0], 3.0)], &[]);
        assert!(round_contours(&dot, &ContourPassConfig::default()).is_empty());
    }
}
