//! Circle pass: turn center proposals into radius-bearing circles.
//!
//! Around each proposal the strong, radially aligned edge pixels are
//! binned by distance. The heaviest bin gives the radius; the fraction of
//! angular sectors holding an edge near that radius gives the coverage.

use super::proposal::{GradientField, Proposal};

/// Circle acceptance controls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CirclePassConfig {
    /// Greedy minimum distance between accepted circle centers (pixels).
    pub min_center_dist: f64,
    /// Edge pixel gradient threshold (fraction of max gradient).
    pub edge_threshold: f32,
    /// Minimum |cos| between gradient and radial direction.
    pub radial_alignment: f32,
    /// Number of angular sectors used to measure coverage.
    pub angular_sectors: usize,
    /// Tolerance (pixels) around the chosen radius when measuring coverage.
    pub radius_tolerance: f64,
    /// Minimum fraction of sectors with a supporting edge.
    pub min_edge_coverage: f64,
}

impl Default for CirclePassConfig {
    fn default() -> Self {
        Self {
            min_center_dist: 25.0,
            edge_threshold: 0.25,
            radial_alignment: 0.8,
            angular_sectors: 36,
            radius_tolerance: 1.5,
            min_edge_coverage: 0.5,
        }
    }
}

/// A circle found by the voting pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CircleHit {
    pub center: [f64; 2],
    pub radius: f64,
    pub coverage: f64,
    pub score: f32,
}

struct EdgeSample {
    dist: f64,
    sector: usize,
    weight: f64,
}

fn radial_edges(
    field: &GradientField,
    center: [f64; 2],
    r_max: f64,
    cfg: &CirclePassConfig,
) -> Vec<EdgeSample> {
    let reach = r_max + cfg.radius_tolerance + 1.0;
    let x0 = (center[0] - reach).floor().max(0.0) as usize;
    let y0 = (center[1] - reach).floor().max(0.0) as usize;
    let x1 = ((center[0] + reach).ceil() as usize).min(field.width.saturating_sub(1));
    let y1 = ((center[1] + reach).ceil() as usize).min(field.height.saturating_sub(1));
    let thr = cfg.edge_threshold * field.max_mag;
    let thr_sq = thr * thr;
    let sectors = cfg.angular_sectors.max(1);

    let mut out = Vec::new();
    for y in y0..=y1 {
        for x in x0..=x1 {
            let (gx, gy) = field.at(x, y);
            let mag_sq = gx * gx + gy * gy;
            if mag_sq < thr_sq || mag_sq <= 0.0 {
                continue;
            }
            let dx = x as f64 - center[0];
            let dy = y as f64 - center[1];
            let dist = (dx * dx + dy * dy).sqrt();
            if dist < 1.0 || dist > reach {
                continue;
            }
            let mag = (mag_sq as f64).sqrt();
            let cos = ((gx as f64) * dx + (gy as f64) * dy) / (mag * dist);
            if cos.abs() < cfg.radial_alignment as f64 {
                continue;
            }
            let angle = dy.atan2(dx) + std::f64::consts::PI;
            let sector = ((angle / std::f64::consts::TAU) * sectors as f64) as usize % sectors;
            out.push(EdgeSample {
                dist,
                sector,
                weight: mag,
            });
        }
    }
    out
}

/// Radius with the heaviest edge support in `[r_min, r_max]` plus its coverage.
fn estimate_radius(
    edges: &[EdgeSample],
    r_min: f64,
    r_max: f64,
    cfg: &CirclePassConfig,
) -> Option<(f64, f64)> {
    let lo = r_min.floor().max(1.0) as usize;
    let hi = r_max.ceil() as usize;
    if hi < lo {
        return None;
    }
    let mut histogram = vec![0.0f64; hi + 1];
    for e in edges {
        let bin = e.dist.round() as usize;
        if (lo..=hi).contains(&bin) {
            histogram[bin] += e.weight;
        }
    }
    let (best, weight) = (lo..=hi)
        .map(|r| (r, histogram[r]))
        .fold((lo, 0.0), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
    if weight <= 0.0 {
        return None;
    }

    let radius = best as f64;
    let sectors = cfg.angular_sectors.max(1);
    let mut covered = vec![false; sectors];
    for e in edges {
        if (e.dist - radius).abs() <= cfg.radius_tolerance {
            covered[e.sector] = true;
        }
    }
    let coverage = covered.iter().filter(|&&c| c).count() as f64 / sectors as f64;
    Some((radius, coverage))
}

/// Greedy acceptance in score order; returns circles in acceptance order.
pub(crate) fn accept_circles(
    field: &GradientField,
    proposals: &[Proposal],
    r_min: f64,
    r_max: f64,
    cfg: &CirclePassConfig,
) -> Vec<CircleHit> {
    let min_dist_sq = cfg.min_center_dist * cfg.min_center_dist;
    let mut hits: Vec<CircleHit> = Vec::new();
    for p in proposals {
        let center = [p.x as f64, p.y as f64];
        let crowded = hits.iter().any(|h| {
            let dx = h.center[0] - center[0];
            let dy = h.center[1] - center[1];
            dx * dx + dy * dy < min_dist_sq
        });
        if crowded {
            continue;
        }
        let edges = radial_edges(field, center, r_max, cfg);
        let Some((radius, coverage)) = estimate_radius(&edges, r_min, r_max, cfg) else {
            continue;
        };
        if coverage < cfg.min_edge_coverage {
            tracing::debug!(
                "circle at ({:.0}, {:.0}) r={} rejected: coverage {:.2}",
                center[0],
                center[1],
                radius,
                coverage
            );
            continue;
        }
        hits.push(CircleHit {
            center,
            radius,
            coverage,
            score: p.score,
        });
    }
    hits
}

/// The circle's bounding box lies fully inside a `width`×`height` image.
pub(crate) fn inside_image(hit: &CircleHit, width: u32, height: u32) -> bool {
    let [x, y] = hit.center;
    let r = hit.radius;
    x - r >= 0.0 && y - r >= 0.0 && x + r < width as f64 && y + r < height as f64
}

#[cfg(test)]
mod tests {
    use super::super::proposal::{find_proposals, CircleProposalConfig};
    use super::*;
    use crate::test_utils::draw_disks;

    fn hits_for(mask: &image::GrayImage) -> Vec<CircleHit> {
        let pcfg = CircleProposalConfig::default();
        let field = GradientField::from_mask(mask, pcfg.blur_sigma);
        let proposals = find_proposals(&field, &pcfg);
        accept_circles(
            &field,
            &proposals,
            pcfg.r_min as f64,
            pcfg.r_max as f64,
            &CirclePassConfig::default(),
        )
    }

    #[test]
    fn disk_radius_is_recovered() {
        let mask = draw_disks(100, 100, &[([50.0, 50.0], 15.0)], &[]);
        let hits = hits_for(&mask);
        assert!(!hits.is_empty());
        let h = hits[0];
        assert!((h.center[0] - 50.0).abs() < 3.0 && (h.center[1] - 50.0).abs() < 3.0);
        assert!((h.radius - 15.0).abs() <= 2.0, "radius {}", h.radius);
        assert!(h.coverage >= 0.9, "coverage {}", h.coverage);
    }

    #[test]
    fn row_of_bubbles_yields_separated_centers() {
        let filled = [([40.0, 40.0], 12.0), ([160.0, 40.0], 12.0)];
        let hollow = [([80.0, 40.0], 12.0), ([120.0, 40.0], 12.0), ([200.0, 40.0], 12.0)];
        let mask = draw_disks(240, 80, &filled, &hollow);
        let hits = hits_for(&mask);
        for expected in [40.0, 80.0, 120.0, 160.0, 200.0] {
            assert!(
                hits.iter()
                    .any(|h| (h.center[0] - expected).abs() < 3.0 && (h.center[1] - 40.0).abs() < 3.0),
                "no circle near x={} in {:?}",
                expected,
                hits
            );
        }
        for (i, a) in hits.iter().enumerate() {
            for b in &hits[i + 1..] {
                let d = ((a.center[0] - b.center[0]).powi(2) + (a.center[1] - b.center[1]).powi(2)).sqrt();
                assert!(d >= 25.0);
            }
        }
    }

    #[test]
    fn bounding_box_check() {
        let hit = CircleHit {
            center: [10.0, 30.0],
            radius: 12.0,
            coverage: 1.0,
            score: 1.0,
        };
        assert!(!inside_image(&hit, 100, 100));
        let hit = CircleHit {
            center: [50.0, 30.0],
            ..hit
        };
        assert!(inside_image(&hit, 100, 100));
        assert!(!inside_image(&hit, 62, 100));
    }
}
