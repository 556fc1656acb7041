//! Fill rates → answer letter and confidence.
//!
//! The adaptive policy derives each row's threshold from the fill
//! distribution: a sheet-wide base level plus the row's own spread, so a
//! faint sheet and a heavily inked one are scored on their own terms.

use crate::answers::{AnswerMark, SheetAnswers};
use crate::detector::Bubble;
use crate::grouping::QuestionRow;
use crate::stats;

/// How the per-row selection threshold is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Distribution-derived threshold, floored at the sensitivity.
    #[default]
    Adaptive,
    /// The sensitivity itself, for every row.
    Fixed,
}

/// Decision engine controls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub policy: ThresholdPolicy,
    /// Sheet base = `mean + global_k * std` over all real bubbles.
    pub global_k: f64,
    /// Row threshold multiplier when the row has a clear strong mark.
    pub k_high: f64,
    /// Row threshold multiplier otherwise.
    pub k_low: f64,
    /// Row std above which a strong mark is trusted.
    pub spread_min: f64,
    /// Max fill above which a mark counts as strong.
    pub strong_fill: f64,
    pub confidence_gain: f64,
    /// Lower bound of the confidence denominator.
    pub confidence_min_denominator: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            policy: ThresholdPolicy::Adaptive,
            global_k: 0.5,
            k_high: 0.8,
            k_low: 1.0,
            spread_min: 0.1,
            strong_fill: 0.4,
            confidence_gain: 1.0,
            confidence_min_denominator: 0.1,
        }
    }
}

/// Outcome for one question row.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RowDecision {
    pub threshold: f64,
    pub choice: Option<usize>,
    pub confidence: f64,
}

/// Base threshold shared by every row of a region.
pub fn sheet_base_threshold(rows: &[QuestionRow], sensitivity: f64, cfg: &DecisionConfig) -> f64 {
    let fills: Vec<f64> = rows
        .iter()
        .flat_map(|r| r.bubbles().iter())
        .filter(|b| !b.is_synthetic())
        .map(Bubble::effective_fill)
        .collect();
    if fills.is_empty() {
        return sensitivity;
    }
    let (mean, std) = stats::mean_and_std(&fills);
    sensitivity.max(mean + cfg.global_k * std)
}

fn top_two(fills: &[f64]) -> Option<(usize, f64, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &f) in fills.iter().enumerate() {
        if best.map_or(true, |(_, bf)| f > bf) {
            best = Some((i, f));
        }
    }
    let (idx, max) = best?;
    let second = fills
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != idx)
        .map(|(_, &f)| f)
        .fold(0.0_f64, f64::max);
    Some((idx, max, second))
}

/// Decide a single row from its fill rates (synthetic slots already at 0).
pub fn decide_row(fills: &[f64], base: f64, sensitivity: f64, cfg: &DecisionConfig) -> RowDecision {
    let Some((idx, max, second)) = top_two(fills) else {
        return RowDecision {
            threshold: base,
            choice: None,
            confidence: 0.0,
        };
    };

    let threshold = match cfg.policy {
        ThresholdPolicy::Fixed => sensitivity,
        ThresholdPolicy::Adaptive => {
            let (mean, std) = stats::mean_and_std(fills);
            if std > cfg.spread_min && max > cfg.strong_fill {
                mean + cfg.k_high * std
            } else {
                base.max(mean + cfg.k_low * std)
            }
        }
    };

    if max <= threshold {
        return RowDecision {
            threshold,
            choice: None,
            confidence: 0.0,
        };
    }
    let confidence = if second > 0.0 {
        let denom = max.max(cfg.confidence_min_denominator);
        (cfg.confidence_gain * (max - second) / denom).clamp(0.0, 1.0)
    } else {
        1.0
    };
    RowDecision {
        threshold,
        choice: Some(idx),
        confidence,
    }
}

/// Decide every row; row `i` answers question `i + 1`.
///
/// The result always holds `questions` entries; rows past that are ignored
/// and missing rows stay unanswered.
pub fn decide_answers(
    rows: &[QuestionRow],
    questions: usize,
    alternatives: usize,
    sensitivity: f64,
    cfg: &DecisionConfig,
) -> SheetAnswers {
    let mut out = SheetAnswers::new(questions);
    let base = sheet_base_threshold(rows, sensitivity, cfg);
    for (i, row) in rows.iter().take(questions).enumerate() {
        let q = i as u32 + 1;
        let mut fills = row.fills();
        fills.truncate(alternatives);
        let d = decide_row(&fills, base, sensitivity, cfg);
        tracing::debug!(
            "question {}: fills {:?} threshold {:.3} -> {:?} ({:.3})",
            q,
            fills,
            d.threshold,
            d.choice,
            d.confidence
        );
        out.set(q, d.choice.map(|c| AnswerMark::new(c as u8)), d.confidence);
    }
    out
}
