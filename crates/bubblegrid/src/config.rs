//! Top-level scan configuration.
//!
//! Every stage owns its config struct; [`ScanConfig`] only aggregates them.
//! All structs deserialize with defaults for missing fields, so a JSON file
//! may override a single knob.

use std::path::Path;

use crate::decision::DecisionConfig;
use crate::detector::BubbleDetectConfig;
use crate::geometry::{ColumnSegmentConfig, PerspectiveConfig};
use crate::grouping::GroupingConfig;
use crate::validate::ValidationConfig;

/// Expected bubble radius range in pixels.
///
/// Drives the detector's radius search and the distance gates that depend
/// on bubble size.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BubbleScalePrior {
    pub radius_min_px: f32,
    pub radius_max_px: f32,
}

impl BubbleScalePrior {
    const MIN_RADIUS_FLOOR_PX: f32 = 3.0;

    pub fn new(radius_min_px: f32, radius_max_px: f32) -> Self {
        Self {
            radius_min_px,
            radius_max_px,
        }
        .normalized()
    }

    /// Range of ±30% around one radius hint.
    pub fn from_nominal_radius_px(radius_px: f32) -> Self {
        Self::new(radius_px * 0.7, radius_px * 1.3)
    }

    /// Finite, ordered, non-degenerate copy.
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        let mut r_min = if self.radius_min_px.is_finite() {
            self.radius_min_px
        } else {
            defaults.radius_min_px
        };
        let mut r_max = if self.radius_max_px.is_finite() {
            self.radius_max_px
        } else {
            defaults.radius_max_px
        };
        if r_min > r_max {
            std::mem::swap(&mut r_min, &mut r_max);
        }
        r_min = r_min.max(Self::MIN_RADIUS_FLOOR_PX);
        r_max = r_max.max(r_min);
        Self {
            radius_min_px: r_min,
            radius_max_px: r_max,
        }
    }
}

impl Default for BubbleScalePrior {
    fn default() -> Self {
        Self {
            radius_min_px: 10.0,
            radius_max_px: 30.0,
        }
    }
}

/// Per-column orchestration controls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ColumnScanConfig {
    /// Process columns on the rayon pool.
    pub parallel: bool,
    /// Widen columns narrower than `width / (columns * narrow_ratio)`.
    pub widen_narrow: bool,
    pub narrow_ratio: f64,
    /// Widening on each side, as a fraction of the sheet width.
    pub widen_frac: f64,
}

impl Default for ColumnScanConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            widen_narrow: true,
            narrow_ratio: 1.5,
            widen_frac: 0.05,
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Size prior. Only [`ScanConfig::from_json_str`] and the setters derive
    /// stage parameters from it; a plain `serde` load keeps it as data.
    pub bubble_scale: BubbleScalePrior,
    pub perspective: PerspectiveConfig,
    pub columns: ColumnSegmentConfig,
    pub column_scan: ColumnScanConfig,
    pub detect: BubbleDetectConfig,
    pub grouping: GroupingConfig,
    pub decision: DecisionConfig,
    pub validation: ValidationConfig,
}

impl ScanConfig {
    /// Defaults with size-dependent parameters derived from `prior`.
    pub fn from_bubble_scale(prior: BubbleScalePrior) -> Self {
        let mut cfg = Self::default();
        cfg.set_bubble_scale(prior);
        cfg
    }

    /// Replace the scale prior and re-derive the parameters that depend on it.
    pub fn set_bubble_scale(&mut self, prior: BubbleScalePrior) {
        self.bubble_scale = prior.normalized();
        apply_bubble_scale_prior(self);
    }

    pub fn set_bubble_radius_hint(&mut self, radius_px: f32) {
        self.set_bubble_scale(BubbleScalePrior::from_nominal_radius_px(radius_px));
    }

    /// Parse a (possibly partial) config.
    ///
    /// When `bubble_scale` is present, size-dependent parameters are derived
    /// from it first; stage values given explicitly in the same document
    /// still take precedence.
    pub fn from_json_str(data: &str) -> Result<Self, serde_json::Error> {
        let overrides: serde_json::Value = serde_json::from_str(data)?;
        let prior = match overrides.get("bubble_scale") {
            Some(v) => Some(serde_json::from_value::<BubbleScalePrior>(v.clone())?),
            None => None,
        };
        let Some(prior) = prior else {
            return serde_json::from_value(overrides);
        };
        let mut merged = serde_json::to_value(Self::from_bubble_scale(prior))?;
        merge_json(&mut merged, overrides);
        let mut cfg: Self = serde_json::from_value(merged)?;
        cfg.bubble_scale = prior.normalized();
        Ok(cfg)
    }

    /// Load a (possibly partial) config from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        Ok(Self::from_json_str(&data)?)
    }
}

/// Recursively overlay `patch` onto `base`; non-object values replace.
fn merge_json(base: &mut serde_json::Value, patch: serde_json::Value) {
    match (base, patch) {
        (serde_json::Value::Object(base), serde_json::Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, patch) => *base = patch,
    }
}

fn apply_bubble_scale_prior(config: &mut ScanConfig) {
    let r_min = config.bubble_scale.radius_min_px;
    let r_max = config.bubble_scale.radius_max_px;

    // Radius search
    config.detect.proposal.r_min = r_min;
    config.detect.proposal.r_max = r_max;
    config.detect.proposal.nms_radius = (r_min * 0.8).max(2.0);

    // Separation gates
    config.detect.circles.min_center_dist = (r_min as f64 * 2.5).max(4.0);
    config.detect.dedup_radius = (r_min as f64 * 2.0).max(3.0);

    // Contour area gate
    config.detect.contours.min_area = (r_min as f64).powi(2);
    config.detect.contours.max_area = (r_max as f64).powi(2);
}
