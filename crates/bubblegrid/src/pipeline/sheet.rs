use image::{GrayImage, RgbImage};
use rayon::prelude::*;

use crate::annotate::{row_annotations, Annotation};
use crate::answers::SheetAnswers;
use crate::config::{ColumnScanConfig, ScanConfig};
use crate::error::ScanError;
use crate::geometry::{
    correct_perspective, detect_column_count, segment_columns, ColumnRegion, ColumnSegmentation,
    SegmentMethod,
};
use crate::layout::{ColumnLayout, SheetLayout};
use crate::validate::Advisory;

use super::region::{scan_region, RegionScan};
use super::result::ScanResult;

/// A scan result together with the rectified color canvas, if one was given.
#[derive(Debug, Clone)]
pub struct ScanOutput {
    pub result: ScanResult,
    pub canvas: Option<RgbImage>,
}

/// Questions per column: `questions / columns`, the remainder going to the
/// leftmost columns.
pub fn distribute_questions(questions: usize, columns: usize) -> Vec<usize> {
    if columns == 0 {
        return Vec::new();
    }
    let base = questions / columns;
    let extra = questions % columns;
    (0..columns).map(|i| base + usize::from(i < extra)).collect()
}

/// Pixel range actually scanned for `region`; narrow columns are widened.
fn scan_span(region: ColumnRegion, columns: usize, width: u32, cfg: &ColumnScanConfig) -> (u32, u32) {
    let narrow_limit = width as f64 / (columns as f64 * cfg.narrow_ratio);
    if !cfg.widen_narrow || (region.width() as f64) >= narrow_limit {
        return (region.x_start, region.x_end);
    }
    let pad = (cfg.widen_frac * width as f64) as u32;
    let start = region.x_start.saturating_sub(pad);
    let end = (region.x_end + pad).min(width);
    tracing::debug!(
        "column [{}, {}) is narrow, scanning [{}, {})",
        region.x_start,
        region.x_end,
        start,
        end
    );
    (start, end)
}

fn check_request(
    mask: &GrayImage,
    color: Option<&RgbImage>,
    layout: &SheetLayout,
) -> Result<(), ScanError> {
    layout.validate()?;
    let (w, h) = mask.dimensions();
    if w == 0 || h == 0 {
        return Err(ScanError::EmptyImage);
    }
    if let Some(c) = color {
        if c.dimensions() != (w, h) {
            return Err(ScanError::DimensionMismatch {
                mask: [w, h],
                color: [c.width(), c.height()],
            });
        }
    }
    if let ColumnLayout::Fixed(n) = layout.columns {
        if n > w as usize {
            return Err(ScanError::TooManyColumns {
                columns: n,
                width: w,
            });
        }
    }
    Ok(())
}

struct ColumnJob {
    index: usize,
    span: (u32, u32),
    questions: usize,
    first_question: u32,
}

fn run_job(mask: &GrayImage, job: &ColumnJob, layout: &SheetLayout, cfg: &ScanConfig) -> RegionScan {
    let (x0, x1) = job.span;
    let crop = image::imageops::crop_imm(mask, x0, 0, x1 - x0, mask.height()).to_image();
    let mut scan = scan_region(
        &crop,
        job.questions,
        layout.alternatives,
        layout.sensitivity,
        cfg,
    );
    tracing::debug!(
        "column {}: questions {}..{}",
        job.index + 1,
        job.first_question,
        job.first_question as usize + job.questions - 1
    );
    scan.translate(x0 as f64, 0.0);
    scan.stats.first_question = job.first_question;
    scan
}

/// Scan a whole sheet: perspective, columns, then the per-region pipeline.
pub fn scan_sheet_with_canvas(
    mask: &GrayImage,
    color: Option<&RgbImage>,
    layout: &SheetLayout,
    cfg: &ScanConfig,
) -> Result<ScanOutput, ScanError> {
    check_request(mask, color, layout)?;
    let image_size = [mask.width(), mask.height()];

    let rectified = correct_perspective(mask, color, &cfg.perspective);
    let sheet = &rectified.mask;
    let width = sheet.width();

    let columns = match layout.columns {
        ColumnLayout::Fixed(n) => n,
        ColumnLayout::Auto => detect_column_count(sheet),
    }
    .min(width as usize)
    .max(1);

    let mut advisories = Vec::new();
    let segmentation = if columns == 1 {
        ColumnSegmentation {
            regions: vec![ColumnRegion {
                x_start: 0,
                x_end: width,
            }],
            method: SegmentMethod::Single,
        }
    } else {
        let seg = segment_columns(sheet, columns, &cfg.columns);
        if seg.method == SegmentMethod::Uniform {
            tracing::warn!("columns: no gutters found, using {} equal columns", columns);
            advisories.push(Advisory::UniformColumns { columns });
        }
        seg
    };

    let counts = distribute_questions(layout.questions, columns);
    let mut first = 1u32;
    let jobs: Vec<ColumnJob> = segmentation
        .regions
        .iter()
        .zip(&counts)
        .enumerate()
        .map(|(index, (&region, &questions))| {
            let span = if columns == 1 {
                (0, width)
            } else {
                scan_span(region, columns, width, &cfg.column_scan)
            };
            let job = ColumnJob {
                index,
                span,
                questions,
                first_question: first,
            };
            first += questions as u32;
            job
        })
        .filter(|job| job.questions > 0 && job.span.1 > job.span.0)
        .collect();

    let scans: Vec<RegionScan> = if cfg.column_scan.parallel && jobs.len() > 1 {
        jobs.par_iter()
            .map(|job| run_job(sheet, job, layout, cfg))
            .collect()
    } else {
        jobs.iter().map(|job| run_job(sheet, job, layout, cfg)).collect()
    };

    let mut answers = SheetAnswers::new(layout.questions);
    let mut bubbles = Vec::new();
    let mut rows = Vec::new();
    let mut annotations = Vec::new();
    let mut regions = Vec::with_capacity(scans.len());
    for region in segmentation.regions.iter().skip(1) {
        annotations.push(Annotation::ColumnSeparator { x: region.x_start });
    }
    for (job, scan) in jobs.iter().zip(scans) {
        let offset = job.first_question - 1;
        answers.absorb(scan.answers, offset);
        annotations.extend(row_annotations(&scan.rows, &answers, job.first_question));
        if columns > 1 {
            annotations.push(Annotation::Label {
                position: [job.span.0 as f64 + 10.0, 20.0],
                text: format!(
                    "Column {}: Q{}-Q{}",
                    job.index + 1,
                    job.first_question,
                    offset as usize + job.questions
                ),
            });
        }
        bubbles.extend(scan.bubbles);
        rows.extend(scan.rows);
        advisories.extend(scan.advisories);
        regions.push(scan.stats);
    }

    tracing::info!(
        "sheet: {} columns ({:?}), {}/{} answered",
        columns,
        segmentation.method,
        answers.answered_count(),
        layout.questions
    );

    let result = ScanResult {
        answers: answers.answers,
        confidence: answers.confidence,
        columns: segmentation.regions,
        column_method: segmentation.method,
        perspective: rectified.report,
        bubbles,
        rows,
        annotations,
        advisories,
        regions,
        image_size,
    };
    Ok(ScanOutput {
        result,
        canvas: rectified.color,
    })
}

/// Scan a whole sheet and return the result only.
pub fn scan_sheet(
    mask: &GrayImage,
    color: Option<&RgbImage>,
    layout: &SheetLayout,
    cfg: &ScanConfig,
) -> Result<ScanResult, ScanError> {
    scan_sheet_with_canvas(mask, color, layout, cfg).map(|out| out.result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::AnswerMark;
    use crate::pipeline::region::scan_region;
    use crate::test_utils::{answer_sheet_mask, sheet_column_width};

    #[test]
    fn questions_are_spread_left_first() {
        assert_eq!(distribute_questions(7, 2), vec![4, 3]);
        assert_eq!(distribute_questions(10, 3), vec![4, 3, 3]);
        assert_eq!(distribute_questions(2, 3), vec![1, 1, 0]);
        assert_eq!(distribute_questions(9, 1), vec![9]);
    }

    #[test]
    fn narrow_column_is_widened_on_both_sides() {
        let cfg = ColumnScanConfig::default();
        let narrow = ColumnRegion {
            x_start: 100,
            x_end: 150,
        };
        assert_eq!(scan_span(narrow, 3, 600, &cfg), (70, 180));
        let wide = ColumnRegion {
            x_start: 0,
            x_end: 200,
        };
        assert_eq!(scan_span(wide, 3, 600, &cfg), (0, 200));
    }

    #[test]
    fn invalid_requests_are_rejected() {
        let mask = GrayImage::new(50, 50);
        let cfg = ScanConfig::default();
        assert_eq!(
            scan_sheet(&GrayImage::new(0, 10), None, &SheetLayout::new(3), &cfg).unwrap_err(),
            ScanError::EmptyImage
        );
        assert_eq!(
            scan_sheet(&mask, None, &SheetLayout::new(0), &cfg).unwrap_err(),
            ScanError::InvalidQuestionCount(0)
        );
        let color = RgbImage::new(51, 50);
        assert!(matches!(
            scan_sheet(&mask, Some(&color), &SheetLayout::new(3), &cfg),
            Err(ScanError::DimensionMismatch { .. })
        ));
        let layout = SheetLayout::new(3).with_columns(ColumnLayout::Fixed(60));
        assert!(matches!(
            scan_sheet(&mask, None, &layout, &cfg),
            Err(ScanError::TooManyColumns { columns: 60, .. })
        ));
    }

    #[test]
    fn blank_sheet_has_every_question_unanswered() {
        let result = scan_sheet(
            &GrayImage::new(300, 200),
            None,
            &SheetLayout::new(6).with_columns(ColumnLayout::Fixed(2)),
            &ScanConfig::default(),
        )
        .unwrap();
        assert_eq!(result.answers.keys().copied().collect::<Vec<_>>(), (1..=6).collect::<Vec<_>>());
        assert!(result.answers.values().all(Option::is_none));
        assert!(result.confidence.values().all(|&c| c == 0.0));
        assert_eq!(result.columns.len(), 2);
        assert_eq!(result.column_method, SegmentMethod::Uniform);
    }

    #[test]
    fn single_column_matches_region_path() {
        let marks = [Some(1), Some(4), Some(0)];
        let mask = answer_sheet_mask(&[3], 5, &marks);
        let cfg = ScanConfig::default();
        let result = scan_sheet(&mask, None, &SheetLayout::new(3), &cfg).unwrap();
        let region = scan_region(&mask, 3, 5, 0.3, &cfg);

        assert!(!result.perspective.corrected);
        assert_eq!(result.answers, region.answers.answers);
        assert_eq!(result.confidence, region.answers.confidence);
        assert_eq!(result.rows, region.rows);
        assert_eq!(result.answers[&2], Some(AnswerMark::new(4)));
    }

    #[test]
    fn two_columns_renumber_questions() {
        let marks = [Some(0), Some(1), Some(2), Some(3), Some(4), None];
        let mask = answer_sheet_mask(&[3, 3], 5, &marks);
        let layout = SheetLayout::new(6).with_columns(ColumnLayout::Fixed(2));

        let mut sequential = ScanConfig::default();
        sequential.column_scan.parallel = false;
        let result = scan_sheet(&mask, None, &layout, &ScanConfig::default()).unwrap();
        let again = scan_sheet(&mask, None, &layout, &sequential).unwrap();

        let cw = sheet_column_width(5);
        assert_eq!(result.columns.len(), 2);
        let boundary = result.columns[0].x_end;
        assert!(boundary > cw - 40 && boundary < cw + 40, "boundary {}", boundary);
        for (q, expected) in marks.iter().enumerate() {
            let got = result.answers[&(q as u32 + 1)].map(|m| m.choice as usize);
            assert_eq!(got, *expected, "question {}", q + 1);
        }
        // Column 2 bubbles are reported in sheet coordinates.
        assert!(result.rows[3].bubbles()[0].x() > cw as f64);
        assert_eq!(result.answers, again.answers);
        assert_eq!(result.confidence, again.confidence);
        assert!(result
            .annotations
            .iter()
            .any(|a| matches!(a, Annotation::Label { text, .. } if text == "Column 2: Q4-Q6")));
    }
}
