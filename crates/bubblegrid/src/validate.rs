//! Post-decision review: low-confidence and anomalous answers become suspect.

use crate::answers::{choice_letter, SheetAnswers};
use crate::stats;

/// Validator controls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Floor of the suspect cutoff.
    pub min_cutoff: f64,
    /// Cutoff = `max(min_cutoff, cutoff_mean_frac * mean positive confidence)`.
    pub cutoff_mean_frac: f64,
    /// Letter-frequency check runs once this fraction of questions is answered.
    pub frequency_min_answered_frac: f64,
    /// A letter is dominant above this multiple of its expected count.
    pub frequency_ratio: f64,
    /// ...and above this absolute count.
    pub frequency_min_count: usize,
    /// Dominant-letter answers below this confidence become suspect.
    pub frequency_confidence: f64,
    /// Warn when fewer than this fraction of questions is answered.
    pub min_answered_frac: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_cutoff: 0.2,
            cutoff_mean_frac: 0.5,
            frequency_min_answered_frac: 0.3,
            frequency_ratio: 2.0,
            frequency_min_count: 3,
            frequency_confidence: 0.4,
            min_answered_frac: 0.5,
        }
    }
}

/// Non-fatal observation about a scored sheet.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    /// Too few questions carry an answer.
    LowAnswerRate { answered: usize, questions: usize },
    /// One letter is chosen far more often than the others.
    DominantChoice { letter: char, count: usize, answered: usize },
    /// Column segmentation fell back to a uniform split.
    UniformColumns { columns: usize },
}

impl std::fmt::Display for Advisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LowAnswerRate {
                answered,
                questions,
            } => write!(f, "only {}/{} questions answered", answered, questions),
            Self::DominantChoice {
                letter,
                count,
                answered,
            } => write!(
                f,
                "choice {} selected {} times out of {} answers",
                letter, count, answered
            ),
            Self::UniformColumns { columns } => {
                write!(f, "no column gutters found; split into {} equal columns", columns)
            }
        }
    }
}

/// Mark suspect answers in place and return the advisories raised.
pub fn validate_answers(
    answers: &mut SheetAnswers,
    questions: usize,
    alternatives: usize,
    cfg: &ValidationConfig,
) -> Vec<Advisory> {
    let mut advisories = Vec::new();
    let positive: Vec<f64> = answers
        .confidence
        .values()
        .copied()
        .filter(|c| *c > 0.0)
        .collect();
    let cutoff = if positive.is_empty() {
        cfg.min_cutoff
    } else {
        cfg.min_cutoff.max(cfg.cutoff_mean_frac * stats::mean(&positive))
    };

    let low: Vec<u32> = answers
        .answers
        .iter()
        .filter(|(_, m)| m.is_some())
        .map(|(&q, _)| q)
        .filter(|&q| answers.confidence_of(q) < cutoff)
        .collect();
    for &q in &low {
        tracing::debug!(
            "question {}: confidence {:.3} below {:.3}, suspect",
            q,
            answers.confidence_of(q),
            cutoff
        );
        answers.mark_suspect(q);
    }

    let confident: Vec<(u32, u8)> = answers
        .answers
        .iter()
        .filter_map(|(&q, m)| m.filter(|m| !m.suspect).map(|m| (q, m.choice)))
        .filter(|&(_, c)| (c as usize) < alternatives)
        .collect();
    let total = confident.len();
    if alternatives > 0 && total as f64 >= cfg.frequency_min_answered_frac * questions as f64 {
        let mut counts = vec![0usize; alternatives];
        for &(_, c) in &confident {
            counts[c as usize] += 1;
        }
        let expected = total as f64 / alternatives as f64;
        for (choice, &count) in counts.iter().enumerate() {
            if count as f64 > cfg.frequency_ratio * expected && count > cfg.frequency_min_count {
                let letter = choice_letter(choice);
                tracing::warn!(
                    "choice {} dominates: {} of {} answers",
                    letter,
                    count,
                    total
                );
                advisories.push(Advisory::DominantChoice {
                    letter,
                    count,
                    answered: total,
                });
                for &(q, c) in &confident {
                    if c as usize == choice && answers.confidence_of(q) < cfg.frequency_confidence {
                        answers.mark_suspect(q);
                    }
                }
            }
        }
    }

    let answered = answers.answered_count();
    if questions > 0 && (answered as f64) < cfg.min_answered_frac * questions as f64 {
        tracing::warn!("only {}/{} questions answered", answered, questions);
        advisories.push(Advisory::LowAnswerRate {
            answered,
            questions,
        });
    }
    advisories
}
