//! Bubble detection: a gradient-voting circle pass with a contour-shape
//! fallback, each candidate measured over an interior disk.

mod bubble;
mod circles;
mod contours;
mod dedup;
mod fill;
mod proposal;

use image::GrayImage;

pub use bubble::{Bubble, BubbleSource};
pub use circles::CirclePassConfig;
pub use contours::ContourPassConfig;
pub use proposal::CircleProposalConfig;

pub(crate) use fill::disk_fill_rate;

/// Bubble detector configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BubbleDetectConfig {
    /// Center proposal (voting) controls; also defines the radius range.
    pub proposal: CircleProposalConfig,
    /// Circle acceptance controls.
    pub circles: CirclePassConfig,
    /// Contour fallback shape gates.
    pub contours: ContourPassConfig,
    /// Run the contour pass when the circle pass found fewer bubbles than this.
    pub contour_fallback_below: usize,
    /// Interior disk radius as a fraction of the bubble radius.
    pub interior_ratio: f64,
    /// Final proximity dedup radius (pixels).
    pub dedup_radius: f64,
}

impl Default for BubbleDetectConfig {
    fn default() -> Self {
        Self {
            proposal: CircleProposalConfig::default(),
            circles: CirclePassConfig::default(),
            contours: ContourPassConfig::default(),
            contour_fallback_below: 10,
            interior_ratio: 0.8,
            dedup_radius: 20.0,
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DetectionStats {
    pub n_proposals: usize,
    pub n_circles: usize,
    pub n_circles_outside: usize,
    pub n_contour_candidates: usize,
    pub contour_pass_run: bool,
    pub n_kept: usize,
}

fn measure(
    mask: &GrayImage,
    center: [f64; 2],
    radius: f64,
    source: BubbleSource,
    sensitivity: f64,
    cfg: &BubbleDetectConfig,
) -> Option<Bubble> {
    let fill_rate = disk_fill_rate(mask, center, radius * cfg.interior_ratio)?;
    Some(Bubble {
        center,
        radius,
        fill_rate,
        filled: fill_rate > sensitivity,
        source,
        contour: None,
    })
}

/// Detect bubbles and report per-pass counts.
pub fn detect_bubbles_with_stats(
    mask: &GrayImage,
    sensitivity: f64,
    cfg: &BubbleDetectConfig,
) -> (Vec<Bubble>, DetectionStats) {
    let (w, h) = mask.dimensions();
    let mut stats = DetectionStats::default();
    if w == 0 || h == 0 {
        return (Vec::new(), stats);
    }

    let field = proposal::GradientField::from_mask(mask, cfg.proposal.blur_sigma);
    let proposals = proposal::find_proposals(&field, &cfg.proposal);
    stats.n_proposals = proposals.len();
    let hits = circles::accept_circles(
        &field,
        &proposals,
        cfg.proposal.r_min as f64,
        cfg.proposal.r_max as f64,
        &cfg.circles,
    );
    stats.n_circles = hits.len();

    let mut found: Vec<Bubble> = Vec::with_capacity(hits.len());
    for hit in &hits {
        if !circles::inside_image(hit, w, h) {
            stats.n_circles_outside += 1;
            continue;
        }
        tracing::debug!(
            "circle ({:.0}, {:.0}) r={} coverage {:.2} votes {:.1}",
            hit.center[0],
            hit.center[1],
            hit.radius,
            hit.coverage,
            hit.score
        );
        if let Some(b) = measure(mask, hit.center, hit.radius, BubbleSource::Circle, sensitivity, cfg) {
            found.push(b);
        }
    }
    let mut bubbles = dedup::dedup_by_proximity(found, cfg.dedup_radius);

    if bubbles.len() < cfg.contour_fallback_below {
        stats.contour_pass_run = true;
        let shapes = contours::round_contours(mask, &cfg.contours);
        stats.n_contour_candidates = shapes.len();
        for shape in shapes {
            if let Some(mut b) = measure(
                mask,
                shape.center,
                shape.radius,
                BubbleSource::Contour,
                sensitivity,
                cfg,
            ) {
                b.contour = Some(shape.polygon);
                bubbles.push(b);
            }
        }
        bubbles = dedup::dedup_by_proximity(bubbles, cfg.dedup_radius);
    }

    stats.n_kept = bubbles.len();
    tracing::info!(
        "{} bubbles detected ({} circles, contour pass {})",
        bubbles.len(),
        stats.n_circles,
        if stats.contour_pass_run { "run" } else { "skipped" }
    );
    (bubbles, stats)
}

/// Detect bubbles in a binary mask (nonzero = ink).
pub fn detect_bubbles(mask: &GrayImage, sensitivity: f64, cfg: &BubbleDetectConfig) -> Vec<Bubble> {
    detect_bubbles_with_stats(mask, sensitivity, cfg).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::draw_disks;

    #[test]
    fn filled_and_empty_bubbles_are_told_apart() {
        let filled = [([40.0, 40.0], 12.0), ([160.0, 40.0], 12.0)];
        let hollow = [([80.0, 40.0], 12.0), ([120.0, 40.0], 12.0), ([200.0, 40.0], 12.0)];
        let mask = draw_disks(240, 80, &filled, &hollow);
        let (bubbles, stats) = detect_bubbles_with_stats(&mask, 0.3, &BubbleDetectConfig::default());

        assert!(stats.contour_pass_run);
        for (x, expect_filled) in [(40.0, true), (80.0, false), (120.0, false), (160.0, true), (200.0, false)] {
            let b = bubbles
                .iter()
                .find(|b| (b.center[0] - x).abs() < 4.0 && (b.center[1] - 40.0).abs() < 4.0)
                .unwrap_or_else(|| panic!("missing bubble at x={}: {:?}", x, bubbles));
            assert_eq!(b.filled, expect_filled, "bubble at x={} fill {}", x, b.fill_rate);
        }
        for (i, a) in bubbles.iter().enumerate() {
            for b in &bubbles[i + 1..] {
                assert!(a.distance_to(b) >= 20.0);
            }
        }
    }

    #[test]
    fn contour_fallback_alone_finds_bubbles() {
        let mask = draw_disks(120, 60, &[([30.0, 30.0], 12.0), ([80.0, 30.0], 12.0)], &[]);
        let mut cfg = BubbleDetectConfig::default();
        // Radius range that cannot match forces the fallback to do the work.
        cfg.proposal.r_min = 40.0;
        cfg.proposal.r_max = 50.0;
        let (bubbles, stats) = detect_bubbles_with_stats(&mask, 0.3, &cfg);
        assert_eq!(stats.n_circles, 0);
        assert_eq!(bubbles.len(), 2);
        assert!(bubbles.iter().all(|b| b.source == BubbleSource::Contour && b.filled));
        assert!(bubbles.iter().all(|b| b.contour.is_some()));
    }

    #[test]
    fn empty_mask_yields_nothing() {
        assert!(detect_bubbles(&GrayImage::new(64, 64), 0.3, &BubbleDetectConfig::default()).is_empty());
    }
}
