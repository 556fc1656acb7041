use std::collections::BTreeMap;

use crate::annotate::Annotation;
use crate::answers::AnswerMark;
use crate::detector::Bubble;
use crate::geometry::{ColumnRegion, PerspectiveReport, SegmentMethod};
use crate::grouping::QuestionRow;
use crate::validate::Advisory;

use super::region::RegionStats;

/// Full scan result for one sheet.
///
/// Geometry (bubbles, rows, columns, annotations) is in the
/// perspective-corrected frame of size `perspective.output_size`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ScanResult {
    /// Question number (1-based) → selected choice, `None` when unanswered.
    pub answers: BTreeMap<u32, Option<AnswerMark>>,
    /// Question number → confidence in `[0, 1]`; 0.0 when unanswered.
    pub confidence: BTreeMap<u32, f64>,
    pub columns: Vec<ColumnRegion>,
    pub column_method: SegmentMethod,
    pub perspective: PerspectiveReport,
    pub bubbles: Vec<Bubble>,
    /// Decided rows in global question order (per column, top to bottom).
    pub rows: Vec<QuestionRow>,
    pub annotations: Vec<Annotation>,
    pub advisories: Vec<Advisory>,
    /// One entry per column.
    pub regions: Vec<RegionStats>,
    /// Input mask dimensions `[width, height]`.
    pub image_size: [u32; 2],
}

impl ScanResult {
    /// Answers rendered as strings (`"C"`, `"C?"`, or empty for unanswered).
    pub fn answer_strings(&self) -> BTreeMap<u32, String> {
        self.answers
            .iter()
            .map(|(&q, m)| (q, m.map(|m| m.to_string()).unwrap_or_default()))
            .collect()
    }

    pub fn answered_count(&self) -> usize {
        self.answers.values().filter(|m| m.is_some()).count()
    }

    pub fn suspect_count(&self) -> usize {
        self.answers
            .values()
            .filter(|m| m.is_some_and(|m| m.suspect))
            .count()
    }
}
