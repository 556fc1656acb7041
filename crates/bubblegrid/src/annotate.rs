//! Debug overlay: structured annotation data plus a rasterizer.
//!
//! The pipeline only produces [`Annotation`] values. [`render`] draws the
//! geometric ones onto an RGB canvas; text labels travel as data only and
//! are left to callers that ship a font.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::answers::SheetAnswers;
use crate::grouping::QuestionRow;

const RED: Rgb<u8> = Rgb([255, 0, 0]);
const GREEN: Rgb<u8> = Rgb([0, 200, 0]);
const GRAY: Rgb<u8> = Rgb([150, 150, 150]);
const SEPARATOR: Rgb<u8> = Rgb([0, 255, 0]);
const SELECTION_THICKNESS: i32 = 3;

/// One overlay primitive, in sheet (global, perspective-corrected) pixels.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Annotation {
    Bubble {
        center: [f64; 2],
        radius: f64,
        filled: bool,
        synthetic: bool,
    },
    /// Bounding box of a question row, tinted by confidence.
    Question {
        question: u32,
        bounds: [f64; 4],
        confidence: f64,
    },
    /// The bubble chosen for a question.
    Selection {
        question: u32,
        center: [f64; 2],
        radius: f64,
    },
    ColumnSeparator { x: u32 },
    Label { position: [f64; 2], text: String },
}

/// Red at 0, yellow at 0.5, green at 1.
pub fn confidence_color(confidence: f64) -> Rgb<u8> {
    let c = confidence.clamp(0.0, 1.0);
    if c < 0.5 {
        Rgb([255, (510.0 * c).round() as u8, 0])
    } else {
        Rgb([(510.0 * (1.0 - c)).round() as u8, 255, 0])
    }
}

/// Overlay data for decided rows; row `i` is question `first_question + i`.
pub fn row_annotations(
    rows: &[QuestionRow],
    answers: &SheetAnswers,
    first_question: u32,
) -> Vec<Annotation> {
    let mut out = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let question = first_question + i as u32;
        if let Some(bounds) = row.bounds() {
            out.push(Annotation::Question {
                question,
                bounds,
                confidence: answers.confidence_of(question),
            });
        }
        for b in row.bubbles() {
            out.push(Annotation::Bubble {
                center: b.center,
                radius: b.radius,
                filled: b.filled,
                synthetic: b.is_synthetic(),
            });
        }
        let picked = answers
            .mark(question)
            .and_then(|m| row.bubbles().get(m.choice as usize));
        if let Some(b) = picked {
            out.push(Annotation::Selection {
                question,
                center: b.center,
                radius: b.radius,
            });
        }
    }
    out
}

fn to_px(v: f64) -> i32 {
    v.round() as i32
}

/// Draw `annotations` onto `canvas`; primitives outside the canvas are clipped.
///
/// Only geometry is rasterized. [`Annotation::Label`] entries (choice letters,
/// fill percentages, column captions) are skipped because no font is
/// available; they remain in the result for callers that render text.
pub fn render(canvas: &mut RgbImage, annotations: &[Annotation]) {
    let h = canvas.height() as f32;
    for a in annotations {
        match a {
            Annotation::Bubble {
                center,
                radius,
                filled,
                synthetic,
            } => {
                let color = if *synthetic {
                    GRAY
                } else if *filled {
                    RED
                } else {
                    GREEN
                };
                draw_hollow_circle_mut(canvas, (to_px(center[0]), to_px(center[1])), to_px(*radius), color);
            }
            Annotation::Question {
                bounds, confidence, ..
            } => {
                let w = (bounds[2] - bounds[0]).round().max(1.0) as u32;
                let hh = (bounds[3] - bounds[1]).round().max(1.0) as u32;
                let rect = Rect::at(to_px(bounds[0]), to_px(bounds[1])).of_size(w, hh);
                draw_hollow_rect_mut(canvas, rect, confidence_color(*confidence));
            }
            Annotation::Selection { center, radius, .. } => {
                let c = (to_px(center[0]), to_px(center[1]));
                for t in 0..SELECTION_THICKNESS {
                    draw_hollow_circle_mut(canvas, c, to_px(*radius) + 2 + t, RED);
                }
            }
            Annotation::ColumnSeparator { x } => {
                let x = *x as f32;
                draw_line_segment_mut(canvas, (x, 0.0), (x, h - 1.0), SEPARATOR);
            }
            Annotation::Label { .. } => {}
        }
    }
}
