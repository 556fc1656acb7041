//! bubblegrid: pure-Rust optical answer sheet scoring.
//!
//! Consumes a binary mask of a photographed or scanned bubble sheet
//! (nonzero = ink) and returns, per question, the selected choice and a
//! confidence value. The pipeline stages are:
//!
//! 1. **Geometry**: perspective rectification from the sheet outline,
//!    column segmentation from the vertical ink projection.
//! 2. **Detector**: gradient-voting circle pass with a contour-shape
//!    fallback; fill rate measured over each bubble's interior disk.
//! 3. **Grouping**: 1-D density clustering of bubble rows, overflow
//!    resolution and synthesis of missed bubbles.
//! 4. **Decision**: distribution-derived thresholds → letter + confidence.
//! 5. **Validation**: low-confidence and dominant-letter answers become
//!    suspect (`"C?"`).
//!
//! # Public API
//! - [`Scanner`] and [`SheetLayout`] as primary entry points
//! - [`ScanConfig`] for tuning every stage
//! - stage functions ([`detect_bubbles`], [`group_questions`],
//!   [`decide_answers`], [`validate_answers`], [`segment_columns`], …) for
//!   callers that run their own pipeline
//!
//! Image decoding and binarization are left to the caller.

mod annotate;
mod answers;
mod api;
mod config;
mod decision;
mod detector;
mod error;
mod geometry;
mod grouping;
mod layout;
mod pipeline;
mod stats;
mod validate;

#[cfg(test)]
pub(crate) mod test_utils;

pub use annotate::{confidence_color, render, row_annotations, Annotation};
pub use answers::{choice_letter, AnswerMark, SheetAnswers};
pub use api::{render_debug, Scanner};
pub use config::{BubbleScalePrior, ColumnScanConfig, ScanConfig};
pub use decision::{
    decide_answers, decide_row, sheet_base_threshold, DecisionConfig, RowDecision,
    ThresholdPolicy,
};
pub use detector::{
    detect_bubbles, detect_bubbles_with_stats, Bubble, BubbleDetectConfig, BubbleSource,
    CirclePassConfig, CircleProposalConfig, ContourPassConfig, DetectionStats,
};
pub use error::ScanError;
pub use geometry::{
    correct_perspective, detect_column_count, segment_columns, ColumnRegion, ColumnSegmentConfig,
    ColumnSegmentation, PerspectiveConfig, PerspectiveOutcome, PerspectiveReport,
    QuadSource, SegmentMethod, MAX_VALLEY_CANDIDATES,
};
pub use grouping::{
    group_questions, group_questions_with_stats, GroupingConfig, GroupingStats, OverflowPolicy,
    QuestionRow,
};
pub use layout::{ColumnLayout, SheetLayout};
pub use pipeline::{
    distribute_questions, scan_region, scan_sheet, scan_sheet_with_canvas, RegionScan,
    RegionStats, ScanOutput, ScanResult,
};
pub use validate::{validate_answers, Advisory, ValidationConfig};
