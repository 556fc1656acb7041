//! Row completion: project the expected choice slots and synthesize the
//! bubbles the detector missed.

use crate::detector::Bubble;
use crate::stats;

/// Slot pitch of a row sorted by x.
///
/// Each gap is expressed as a whole number of `reference` pitches so a
/// missing middle bubble does not double the estimate. Rows with a single
/// bubble fall back to the reference, then to `fallback_factor` diameters.
pub(crate) fn row_spacing(row: &[Bubble], reference: Option<f64>, fallback_factor: f64) -> f64 {
    let diameter_fallback = || {
        let r = stats::mean(&row.iter().map(|b| b.radius).collect::<Vec<_>>());
        fallback_factor * 2.0 * r.max(1.0)
    };
    let xs: Vec<f64> = row.iter().map(|b| b.x()).collect();
    let gaps: Vec<f64> = stats::diffs(&xs).into_iter().filter(|g| *g > 1e-6).collect();
    if gaps.is_empty() {
        return reference.filter(|r| *r > 1e-6).unwrap_or_else(diameter_fallback);
    }

    let unit = reference
        .filter(|r| *r > 1e-6)
        .or_else(|| stats::median(&gaps))
        .unwrap_or(1.0);
    let per_slot: Vec<f64> = gaps
        .iter()
        .map(|g| {
            let steps = (g / unit).round().max(1.0);
            g / steps
        })
        .collect();
    stats::median(&per_slot)
        .filter(|s| *s > 1e-6)
        .unwrap_or_else(diameter_fallback)
}

/// Offset of the first slot that best explains the observed x positions.
fn best_start(xs: &[f64], spacing: f64, slots: usize) -> f64 {
    let x0 = xs[0];
    let mut best = x0;
    let mut best_err = f64::INFINITY;
    for i in 0..slots {
        let start = x0 - i as f64 * spacing;
        let err: f64 = (0..slots)
            .map(|k| {
                let pos = start + k as f64 * spacing;
                xs.iter()
                    .map(|x| (pos - x).abs())
                    .fold(f64::INFINITY, f64::min)
            })
            .sum();
        if err < best_err {
            best_err = err;
            best = start;
        }
    }
    best.max(0.0)
}

/// Fill `row` (sorted by x, shorter than `slots`) up to exactly `slots` bubbles.
///
/// Returns the completed row and how many synthetic bubbles were added.
pub(crate) fn complete_row(
    row: Vec<Bubble>,
    slots: usize,
    spacing: f64,
    match_frac: f64,
) -> (Vec<Bubble>, usize) {
    if row.is_empty() || row.len() >= slots {
        return (row, 0);
    }
    let xs: Vec<f64> = row.iter().map(|b| b.x()).collect();
    let mean_y = stats::mean(&row.iter().map(|b| b.y()).collect::<Vec<_>>());
    let mean_r = stats::mean(&row.iter().map(|b| b.radius).collect::<Vec<_>>());
    let start = best_start(&xs, spacing, slots);
    let tolerance = match_frac * spacing;

    let mut used = vec![false; row.len()];
    let mut picks: Vec<Option<usize>> = Vec::with_capacity(slots);
    for k in 0..slots {
        let pos = start + k as f64 * spacing;
        let nearest = (0..row.len())
            .filter(|&i| !used[i] && (xs[i] - pos).abs() < tolerance)
            .min_by(|&a, &b| (xs[a] - pos).abs().total_cmp(&(xs[b] - pos).abs()));
        if let Some(i) = nearest {
            used[i] = true;
        }
        picks.push(nearest);
    }

    let mut synthesized = 0;
    let mut pool: Vec<Option<Bubble>> = row.into_iter().map(Some).collect();
    let mut out: Vec<Bubble> = picks
        .into_iter()
        .enumerate()
        .map(|(k, pick)| match pick.and_then(|i| pool[i].take()) {
            Some(b) => b,
            None => {
                synthesized += 1;
                Bubble::synthetic([start + k as f64 * spacing, mean_y], mean_r)
            }
        })
        .collect();
    out.sort_by(|a, b| a.x().total_cmp(&b.x()));
    out.truncate(slots);
    (out, synthesized)
}
