//! Question grouping: bubbles → rows (questions) → ordered choice slots.
//!
//! Rows are found by clustering y coordinates, trimmed to the expected
//! question count, and each row is reconciled to exactly one bubble per
//! choice: overflow is bucketed, shortfall is completed with synthetic
//! placeholders on the row's slot pitch.

mod completion;
mod dbscan;
mod overflow;

use crate::detector::Bubble;
use crate::stats;

pub use overflow::OverflowPolicy;

/// One question: exactly `alternatives` bubbles sorted by x, choice 0 first.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuestionRow(pub Vec<Bubble>);

impl QuestionRow {
    pub fn bubbles(&self) -> &[Bubble] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decision fill rates (synthetic bubbles count as empty).
    pub fn fills(&self) -> Vec<f64> {
        self.0.iter().map(Bubble::effective_fill).collect()
    }

    pub fn mean_y(&self) -> f64 {
        stats::mean(&self.0.iter().map(Bubble::y).collect::<Vec<_>>())
    }

    /// `[min_x, min_y, max_x, max_y]` over the bubble disks.
    pub fn bounds(&self) -> Option<[f64; 4]> {
        let first = self.0.first()?;
        let mut b = [
            first.x() - first.radius,
            first.y() - first.radius,
            first.x() + first.radius,
            first.y() + first.radius,
        ];
        for bubble in &self.0[1..] {
            b[0] = b[0].min(bubble.x() - bubble.radius);
            b[1] = b[1].min(bubble.y() - bubble.radius);
            b[2] = b[2].max(bubble.x() + bubble.radius);
            b[3] = b[3].max(bubble.y() + bubble.radius);
        }
        Some(b)
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.0.iter_mut().for_each(|b| b.translate(dx, dy));
    }
}

/// Grouping controls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// Percentile of sorted y gaps that seeds the clustering radius.
    pub eps_percentile: f64,
    /// Multiplier applied to that percentile.
    pub eps_scale: f64,
    /// Lower bound on the clustering radius (pixels).
    pub eps_floor: f64,
    /// Clustering radius when there is a single bubble.
    pub eps_default: f64,
    /// Re-cluster once when clusters exceed this multiple of the question count.
    pub max_cluster_ratio: f64,
    /// Radius growth for the re-clustering pass.
    pub eps_growth: f64,
    /// Same-row bubbles closer than this many median radii are duplicates.
    pub duplicate_merge_factor: f64,
    pub overflow_policy: OverflowPolicy,
    /// Real bubbles match a projected slot within this fraction of the pitch.
    pub slot_match_frac: f64,
    /// Pitch in diameters for a lone bubble when no reference pitch exists.
    pub single_bubble_pitch: f64,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            eps_percentile: 25.0,
            eps_scale: 0.75,
            eps_floor: 10.0,
            eps_default: 20.0,
            max_cluster_ratio: 1.5,
            eps_growth: 1.5,
            duplicate_merge_factor: 1.0,
            overflow_policy: OverflowPolicy::HighestFill,
            slot_match_frac: 0.5,
            single_bubble_pitch: 2.5,
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct GroupingStats {
    pub eps: f64,
    pub reclustered: bool,
    pub n_clusters: usize,
    pub n_noise: usize,
    pub n_rows_dropped: usize,
    pub n_duplicates_merged: usize,
    pub n_overflow_dropped: usize,
    pub n_synthetic: usize,
    pub reference_pitch: Option<f64>,
}

fn clustering_radius(ys: &[f64], cfg: &GroupingConfig) -> f64 {
    let mut sorted = ys.to_vec();
    sorted.sort_by(f64::total_cmp);
    let gaps = stats::diffs(&sorted);
    match stats::percentile(&gaps, cfg.eps_percentile) {
        Some(p) => (p * cfg.eps_scale).max(cfg.eps_floor),
        None => cfg.eps_default,
    }
}

/// Ranking of a surplus cluster: well-populated, evenly spaced rows win.
fn row_score(cluster: &[Bubble], alternatives: usize) -> f64 {
    let n = cluster.len() as f64;
    if cluster.len() >= alternatives {
        let mut xs: Vec<f64> = cluster.iter().map(Bubble::x).collect();
        xs.sort_by(f64::total_cmp);
        n / (1.0 + stats::std_dev(&stats::diffs(&xs)) / 100.0)
    } else {
        n / alternatives as f64
    }
}

fn cluster_mean_y(cluster: &[Bubble]) -> f64 {
    stats::mean(&cluster.iter().map(Bubble::y).collect::<Vec<_>>())
}

/// Median x pitch over rows that already hold exactly `alternatives` bubbles.
fn reference_pitch(rows: &[Vec<Bubble>], alternatives: usize) -> Option<f64> {
    if alternatives < 2 {
        return None;
    }
    let gaps: Vec<f64> = rows
        .iter()
        .filter(|r| r.len() == alternatives)
        .flat_map(|r| stats::diffs(&r.iter().map(Bubble::x).collect::<Vec<_>>()))
        .filter(|g| *g > 1e-6)
        .collect();
    stats::median(&gaps)
}

/// Group bubbles into at most `questions` rows of exactly `alternatives` bubbles.
pub fn group_questions_with_stats(
    bubbles: &[Bubble],
    questions: usize,
    alternatives: usize,
    cfg: &GroupingConfig,
) -> (Vec<QuestionRow>, GroupingStats) {
    let mut st = GroupingStats::default();
    if bubbles.is_empty() || questions == 0 || alternatives == 0 {
        return (Vec::new(), st);
    }

    let ys: Vec<f64> = bubbles.iter().map(Bubble::y).collect();
    let min_samples = (bubbles.len() / questions).clamp(1, 2);
    let mut eps = clustering_radius(&ys, cfg);
    let mut labels = dbscan::dbscan_1d(&ys, eps, min_samples);
    let mut n_clusters = dbscan::cluster_count(&labels);
    if n_clusters > 1 && n_clusters as f64 > cfg.max_cluster_ratio * questions as f64 {
        eps *= cfg.eps_growth;
        labels = dbscan::dbscan_1d(&ys, eps, min_samples);
        n_clusters = dbscan::cluster_count(&labels);
        st.reclustered = true;
    }
    st.eps = eps;
    st.n_clusters = n_clusters;
    st.n_noise = labels.iter().filter(|&&l| l == dbscan::NOISE).count();

    let mut clusters: Vec<Vec<Bubble>> = vec![Vec::new(); n_clusters];
    for (b, &label) in bubbles.iter().zip(&labels) {
        if label != dbscan::NOISE {
            clusters[label as usize].push(b.clone());
        }
    }
    clusters.sort_by(|a, b| cluster_mean_y(a).total_cmp(&cluster_mean_y(b)));

    if clusters.len() > questions {
        tracing::warn!(
            "grouping: {} rows found, expected {}; keeping the best formed",
            clusters.len(),
            questions
        );
        st.n_rows_dropped = clusters.len() - questions;
        let mut scored: Vec<(f64, Vec<Bubble>)> = clusters
            .into_iter()
            .map(|c| (row_score(&c, alternatives), c))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(questions);
        clusters = scored.into_iter().map(|(_, c)| c).collect();
        clusters.sort_by(|a, b| cluster_mean_y(a).total_cmp(&cluster_mean_y(b)));
    } else if clusters.len() < questions {
        tracing::warn!(
            "grouping: {} rows found, expected {}",
            clusters.len(),
            questions
        );
    }

    let mut rows: Vec<Vec<Bubble>> = clusters
        .into_iter()
        .map(|mut row| {
            row.sort_by(|a, b| a.x().total_cmp(&b.x()));
            if row.len() > alternatives {
                let (merged, dropped) =
                    overflow::merge_near_duplicates(row, cfg.duplicate_merge_factor);
                st.n_duplicates_merged += dropped;
                let before = merged.len();
                let kept = overflow::resolve_overflow(merged, alternatives, cfg.overflow_policy);
                st.n_overflow_dropped += before - kept.len();
                kept
            } else {
                row
            }
        })
        .collect();

    let reference = reference_pitch(&rows, alternatives);
    st.reference_pitch = reference;
    for row in rows.iter_mut() {
        if row.len() < alternatives {
            let pitch = completion::row_spacing(row, reference, cfg.single_bubble_pitch);
            let (completed, added) = completion::complete_row(
                std::mem::take(row),
                alternatives,
                pitch,
                cfg.slot_match_frac,
            );
            st.n_synthetic += added;
            *row = completed;
        }
    }

    tracing::info!(
        "grouping: {} rows (eps {:.1}, {} synthetic, {} overflow dropped)",
        rows.len(),
        st.eps,
        st.n_synthetic,
        st.n_overflow_dropped
    );
    (rows.into_iter().map(QuestionRow).collect(), st)
}

/// Group bubbles into at most `questions` rows of exactly `alternatives` bubbles.
pub fn group_questions(
    bubbles: &[Bubble],
    questions: usize,
    alternatives: usize,
    cfg: &GroupingConfig,
) -> Vec<QuestionRow> {
    group_questions_with_stats(bubbles, questions, alternatives, cfg).0
}
