//! High-level scanning API.
//!
//! [`Scanner`] is the primary entry point. It pairs a [`SheetLayout`] with a
//! [`ScanConfig`]; create it once and scan many sheets of the same layout.

use image::{GrayImage, RgbImage};
use std::path::Path;

use crate::annotate;
use crate::config::{BubbleScalePrior, ScanConfig};
use crate::error::ScanError;
use crate::layout::SheetLayout;
use crate::pipeline::{self, ScanOutput, ScanResult};

/// Primary scanning interface.
///
/// # Examples
///
/// ```no_run
/// use bubblegrid::{Scanner, SheetLayout};
/// use image::GrayImage;
///
/// let scanner = Scanner::new(SheetLayout::new(20));
/// let mask = GrayImage::new(400, 1000);
/// let result = scanner.scan(&mask).unwrap();
/// println!("{} of 20 answered", result.answered_count());
/// ```
pub struct Scanner {
    layout: SheetLayout,
    config: ScanConfig,
}

impl Scanner {
    /// Scanner with default configuration.
    pub fn new(layout: SheetLayout) -> Self {
        Self {
            layout,
            config: ScanConfig::default(),
        }
    }

    /// Scanner with an explicit bubble radius range.
    pub fn with_bubble_scale(layout: SheetLayout, scale: BubbleScalePrior) -> Self {
        Self {
            layout,
            config: ScanConfig::from_bubble_scale(scale),
        }
    }

    /// Scanner tuned for bubbles of roughly `radius_px`.
    pub fn with_bubble_radius_hint(layout: SheetLayout, radius_px: f32) -> Self {
        Self::with_bubble_scale(layout, BubbleScalePrior::from_nominal_radius_px(radius_px))
    }

    /// Load a sheet layout JSON file and create a scanner in one step.
    pub fn from_layout_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::new(SheetLayout::from_json_file(path)?))
    }

    /// Create with full config control.
    pub fn with_config(layout: SheetLayout, config: ScanConfig) -> Self {
        Self { layout, config }
    }

    pub fn layout(&self) -> &SheetLayout {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut SheetLayout {
        &mut self.layout
    }

    /// Access the current configuration.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Mutable access to configuration for post-construction tuning.
    pub fn config_mut(&mut self) -> &mut ScanConfig {
        &mut self.config
    }

    /// Scan a binary mask (nonzero = ink).
    pub fn scan(&self, mask: &GrayImage) -> Result<ScanResult, ScanError> {
        pipeline::scan_sheet(mask, None, &self.layout, &self.config)
    }

    /// Scan with a color canvas; the output carries the canvas rectified
    /// into the same frame as the result geometry.
    pub fn scan_with_color(
        &self,
        mask: &GrayImage,
        color: &RgbImage,
    ) -> Result<ScanOutput, ScanError> {
        pipeline::scan_sheet_with_canvas(mask, Some(color), &self.layout, &self.config)
    }
}

/// Draw the result's annotations onto its rectified canvas.
pub fn render_debug(output: &ScanOutput) -> Option<RgbImage> {
    let mut canvas = output.canvas.clone()?;
    annotate::render(&mut canvas, &output.result.annotations);
    Some(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::ThresholdPolicy;
    use crate::test_utils::answer_sheet_mask;

    #[test]
    fn scanner_reads_a_clean_sheet() {
        let mask = answer_sheet_mask(&[4], 5, &[Some(3), None, Some(1), Some(1)]);
        let scanner = Scanner::new(SheetLayout::new(4));
        let result = scanner.scan(&mask).unwrap();
        assert_eq!(result.answer_strings()[&1], "D");
        assert_eq!(result.answer_strings()[&2], "");
        assert_eq!(result.answered_count(), 3);
        assert_eq!(result.image_size, [mask.width(), mask.height()]);
    }

    #[test]
    fn config_mut_tunes_the_scanner() {
        let mut scanner = Scanner::new(SheetLayout::new(3));
        scanner.config_mut().decision.policy = ThresholdPolicy::Fixed;
        assert_eq!(scanner.config().decision.policy, ThresholdPolicy::Fixed);
        scanner.layout_mut().alternatives = 4;
        assert_eq!(scanner.layout().alternatives, 4);
    }

    #[test]
    fn radius_hint_and_layout_file_constructors() {
        let scanner = Scanner::with_bubble_radius_hint(SheetLayout::new(2), 20.0);
        let scale = scanner.config().bubble_scale;
        assert!((scale.radius_min_px - 14.0).abs() < 1e-4);
        assert!((scale.radius_max_px - 26.0).abs() < 1e-4);

        let path = std::env::temp_dir().join(format!("bubblegrid_layout_{}.json", std::process::id()));
        let layout = SheetLayout::new(12).with_sensitivity(0.4);
        std::fs::write(&path, layout.to_json_string().unwrap()).unwrap();
        let scanner = Scanner::from_layout_json_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(scanner.layout(), &layout);
    }

    #[test]
    fn debug_render_needs_a_canvas() {
        let mask = answer_sheet_mask(&[2], 4, &[Some(0), Some(2)]);
        let color = RgbImage::new(mask.width(), mask.height());
        let scanner = Scanner::new(SheetLayout::new(2).with_alternatives(4));
        let output = scanner.scan_with_color(&mask, &color).unwrap();
        let canvas = render_debug(&output).unwrap();
        assert_eq!(canvas.dimensions(), mask.dimensions());
        assert!(canvas.pixels().any(|p| p.0 != [0, 0, 0]));

        let bare = ScanOutput {
            result: output.result,
            canvas: None,
        };
        assert!(render_debug(&bare).is_none());
    }
}
