use image::GrayImage;

use crate::answers::SheetAnswers;
use crate::config::ScanConfig;
use crate::decision::decide_answers;
use crate::detector::{detect_bubbles_with_stats, Bubble, DetectionStats};
use crate::grouping::{group_questions_with_stats, GroupingStats, QuestionRow};
use crate::validate::{validate_answers, Advisory};

/// Per-region counters, kept in the result for diagnostics.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct RegionStats {
    /// Questions allotted to the region.
    pub questions: usize,
    /// First global question number of the region.
    pub first_question: u32,
    pub detection: DetectionStats,
    pub grouping: GroupingStats,
}

/// Everything one region produced, in region-local coordinates.
#[derive(Debug, Clone)]
pub struct RegionScan {
    pub bubbles: Vec<Bubble>,
    pub rows: Vec<QuestionRow>,
    /// Keyed `1..=questions`, local numbering.
    pub answers: SheetAnswers,
    pub advisories: Vec<Advisory>,
    pub stats: RegionStats,
}

impl RegionScan {
    /// Shift all geometry by `(dx, dy)`.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.bubbles.iter_mut().for_each(|b| b.translate(dx, dy));
        self.rows.iter_mut().for_each(|r| r.translate(dx, dy));
    }
}

/// Detect → group → decide → validate on one region of the mask.
pub fn scan_region(
    mask: &GrayImage,
    questions: usize,
    alternatives: usize,
    sensitivity: f64,
    cfg: &ScanConfig,
) -> RegionScan {
    let (bubbles, detection) = detect_bubbles_with_stats(mask, sensitivity, &cfg.detect);
    let (rows, grouping) =
        group_questions_with_stats(&bubbles, questions, alternatives, &cfg.grouping);
    let mut answers = decide_answers(&rows, questions, alternatives, sensitivity, &cfg.decision);
    let advisories = validate_answers(&mut answers, questions, alternatives, &cfg.validation);

    tracing::info!(
        "region {}x{}: {} bubbles, {} rows, {}/{} answered",
        mask.width(),
        mask.height(),
        bubbles.len(),
        rows.len(),
        answers.answered_count(),
        questions
    );

    RegionScan {
        bubbles,
        rows,
        answers,
        advisories,
        stats: RegionStats {
            questions,
            first_question: 1,
            detection,
            grouping,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::AnswerMark;
    use crate::test_utils::answer_sheet_mask;

    #[test]
    fn clean_column_is_read_back() {
        let marks = [Some(2), Some(0), None];
        let mask = answer_sheet_mask(&[3], 5, &marks);
        let scan = scan_region(&mask, 3, 5, 0.3, &ScanConfig::default());

        assert_eq!(scan.rows.len(), 3);
        assert!(scan.rows.iter().all(|r| r.len() == 5));
        assert_eq!(scan.answers.mark(1), Some(AnswerMark::new(2)));
        assert_eq!(scan.answers.mark(2), Some(AnswerMark::new(0)));
        assert_eq!(scan.answers.mark(3), None);
        assert_eq!(scan.answers.confidence_of(3), 0.0);
        assert!(scan.answers.confidence_of(1) > 0.9);
    }

    #[test]
    fn blank_region_yields_unanswered_entries() {
        let scan = scan_region(&GrayImage::new(200, 100), 4, 5, 0.3, &ScanConfig::default());
        assert!(scan.bubbles.is_empty());
        assert_eq!(scan.answers.len(), 4);
        assert_eq!(scan.answers.answered_count(), 0);
        assert!(scan
            .advisories
            .iter()
            .any(|a| matches!(a, Advisory::LowAnswerRate { .. })));
    }
}
