//! Rows holding more bubbles than there are choices.

use crate::detector::Bubble;
use crate::stats;

/// Which bubble survives when several fall into one choice slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Keep the most strongly inked bubble.
    #[default]
    HighestFill,
    /// Keep the bubble closest to the slot centre.
    NearestToSlot,
}

fn fill_cmp(a: &Bubble, b: &Bubble) -> std::cmp::Ordering {
    a.effective_fill().total_cmp(&b.effective_fill())
}

/// Collapse x-neighbours closer than `factor × median radius`, keeping the higher fill.
///
/// `row` must be sorted by x. Returns the merged row and the number of drops.
pub(crate) fn merge_near_duplicates(row: Vec<Bubble>, factor: f64) -> (Vec<Bubble>, usize) {
    let radii: Vec<f64> = row.iter().map(|b| b.radius).collect();
    let Some(median_r) = stats::median(&radii) else {
        return (row, 0);
    };
    let min_gap = factor * median_r;
    let before = row.len();
    let mut out: Vec<Bubble> = Vec::with_capacity(row.len());
    for b in row {
        match out.last_mut() {
            Some(prev) if b.x() - prev.x() < min_gap => {
                if fill_cmp(&b, prev).is_gt() {
                    *prev = b;
                }
            }
            _ => out.push(b),
        }
    }
    let dropped = before - out.len();
    (out, dropped)
}

/// Split `[min_x, max_x]` into `slots` equal buckets and keep one bubble per bucket.
///
/// Empty buckets are simply absent from the output, which stays sorted by x.
pub(crate) fn resolve_overflow(row: Vec<Bubble>, slots: usize, policy: OverflowPolicy) -> Vec<Bubble> {
    if row.len() <= slots || slots == 0 {
        return row;
    }
    let min_x = row.iter().map(|b| b.x()).fold(f64::INFINITY, f64::min);
    let max_x = row.iter().map(|b| b.x()).fold(f64::NEG_INFINITY, f64::max);
    let span = (max_x - min_x).max(1.0);
    let bucket_w = span / slots as f64;

    let mut buckets: Vec<Vec<Bubble>> = vec![Vec::new(); slots];
    for b in row {
        let idx = (((b.x() - min_x) / bucket_w) as usize).min(slots - 1);
        buckets[idx].push(b);
    }

    let mut kept: Vec<Bubble> = buckets
        .into_iter()
        .enumerate()
        .filter_map(|(k, bucket)| {
            let slot_center = min_x + (k as f64 + 0.5) * bucket_w;
            match policy {
                OverflowPolicy::HighestFill => bucket
                    .into_iter()
                    .reduce(|best, b| if fill_cmp(&b, &best).is_gt() { b } else { best }),
                OverflowPolicy::NearestToSlot => bucket.into_iter().reduce(|best, b| {
                    if (b.x() - slot_center).abs() < (best.x() - slot_center).abs() {
                        b
                    } else {
                        best
                    }
                }),
            }
        })
        .collect();
    kept.sort_by(|a, b| a.x().total_cmp(&b.x()));
    kept
}
