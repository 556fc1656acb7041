//! Column segmentation from the vertical ink projection.
//!
//! Column gutters show up as valleys in the column-wise foreground count.
//! When the projection alone is inconclusive, tall closed shapes (column
//! frames) corroborate the split, then shallow dips, then an even split.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;

use super::polygon;

/// Upper bound on valley candidates entering the combination search.
pub const MAX_VALLEY_CANDIDATES: usize = 10;

/// Column segmentation controls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ColumnSegmentConfig {
    /// Normalized projection value below which a sample may be a valley.
    pub valley_threshold: f64,
    /// Samples inspected on each side of a valley candidate.
    pub side_window: usize,
    /// A valley must not exceed this fraction of both side maxima.
    pub side_ratio: f64,
    /// Corroborate with tall closed shapes when valleys are missing.
    pub structural: bool,
    /// Closing radius (square kernel) applied before the structural pass.
    pub close_radius: u8,
    /// Spans closer than this fraction of the width are merged.
    pub span_merge_frac: f64,
    /// Fall back to shallow dips ranked by depth before dividing evenly.
    pub shallow_supplement: bool,
}

impl Default for ColumnSegmentConfig {
    fn default() -> Self {
        Self {
            valley_threshold: 0.15,
            side_window: 20,
            side_ratio: 0.7,
            structural: true,
            close_radius: 5,
            span_merge_frac: 0.05,
            shallow_supplement: true,
        }
    }
}

/// Half-open horizontal pixel range `[x_start, x_end)` spanning the full height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ColumnRegion {
    pub x_start: u32,
    pub x_end: u32,
}

impl ColumnRegion {
    pub fn width(&self) -> u32 {
        self.x_end.saturating_sub(self.x_start)
    }
}

/// How the final boundaries were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentMethod {
    Single,
    Valleys,
    Structural,
    Shallow,
    Uniform,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ColumnSegmentation {
    pub regions: Vec<ColumnRegion>,
    pub method: SegmentMethod,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    x: usize,
    /// Smoothed projection value; lower is deeper.
    value: f64,
    /// Width of the qualifying run; breaks ties between equally deep valleys.
    run: usize,
}

/// Foreground pixel count per image column.
pub(crate) fn vertical_projection(mask: &GrayImage) -> Vec<f64> {
    let (w, h) = mask.dimensions();
    let mut proj = vec![0.0; w as usize];
    for y in 0..h {
        for (x, count) in proj.iter_mut().enumerate() {
            if mask.get_pixel(x as u32, y)[0] > 0 {
                *count += 1.0;
            }
        }
    }
    proj
}

/// Centered box filter with zero padding; output has the input length.
pub(crate) fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    if window <= 1 || n == 0 {
        return values.to_vec();
    }
    let left = window / 2;
    let right = window - 1 - left;
    let mut prefix = vec![0.0; n + 1];
    for i in 0..n {
        prefix[i + 1] = prefix[i] + values[i];
    }
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(left);
            let hi = (i + right + 1).min(n);
            (prefix[hi] - prefix[lo]) / window as f64
        })
        .collect()
}

fn normalize_by_max(values: &mut [f64]) -> bool {
    let max = values.iter().cloned().fold(0.0f64, f64::max);
    if max <= 0.0 {
        return false;
    }
    values.iter_mut().for_each(|v| *v /= max);
    true
}

fn window_max(values: &[f64], lo: usize, hi: usize) -> f64 {
    values[lo..hi.min(values.len())]
        .iter()
        .cloned()
        .fold(0.0f64, f64::max)
}

fn side_maxima(profile: &[f64], i: usize, window: usize) -> (f64, f64) {
    let left = window_max(profile, i.saturating_sub(window), i);
    let right = window_max(profile, i + 1, i + 1 + window);
    (left, right)
}

/// Deep valleys; runs of adjacent qualifying samples collapse to their midpoint.
fn find_valleys(profile: &[f64], win: usize, cfg: &ColumnSegmentConfig) -> Vec<Candidate> {
    let n = profile.len();
    if n <= 2 * win {
        return Vec::new();
    }
    let mut hits: Vec<usize> = Vec::new();
    for i in win..(n - win) {
        let v = profile[i];
        if v >= cfg.valley_threshold {
            continue;
        }
        let (left, right) = side_maxima(profile, i, cfg.side_window);
        if v <= left * cfg.side_ratio && v <= right * cfg.side_ratio {
            hits.push(i);
        }
    }

    let mut valleys = Vec::new();
    let mut run_start = 0;
    for k in 0..hits.len() {
        let run_ends = k + 1 == hits.len() || hits[k + 1] != hits[k] + 1;
        if run_ends {
            let mid = (hits[run_start] + hits[k]) / 2;
            valleys.push(Candidate {
                x: mid,
                value: profile[mid],
                run: hits[k] - hits[run_start] + 1,
            });
            run_start = k + 1;
        }
    }
    valleys
}

/// Horizontal extents of tall closed shapes, merged and trimmed to `columns` widest.
pub(crate) fn structural_spans(
    mask: &GrayImage,
    columns: usize,
    cfg: &ColumnSegmentConfig,
) -> Vec<(f64, f64)> {
    let (w, h) = mask.dimensions();
    let closed = imageproc::morphology::close(mask, Norm::LInf, cfg.close_radius);
    let min_area = (w as f64 * h as f64) / (columns as f64 * 10.0);

    let mut spans: Vec<(f64, f64)> = find_contours::<i32>(&closed)
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(|c| {
            let pts = polygon::contour_points(c);
            let rect = polygon::bounding_rect(&pts)?;
            (polygon::area(&pts) > min_area && rect.h > h as f64 / 2.0)
                .then_some((rect.x, rect.x + rect.w))
        })
        .collect();
    spans.sort_by(|a, b| a.0.total_cmp(&b.0));

    let merge_gap = cfg.span_merge_frac * w as f64;
    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if span.0 - last.1 < merge_gap => last.1 = last.1.max(span.1),
            _ => merged.push(span),
        }
    }

    if merged.len() > columns {
        merged.sort_by(|a, b| (b.1 - b.0).total_cmp(&(a.1 - a.0)));
        merged.truncate(columns);
        merged.sort_by(|a, b| a.0.total_cmp(&b.0));
    }
    merged
}

/// Dips of any depth, deepest first, skipping ones near already chosen candidates.
fn shallow_valleys(
    profile: &[f64],
    win: usize,
    existing: &[Candidate],
    min_distance: usize,
    wanted: usize,
) -> Vec<Candidate> {
    let n = profile.len();
    if n <= 2 * win || wanted == 0 {
        return Vec::new();
    }
    let mut ranked: Vec<(usize, f64)> = (win..(n - win))
        .filter_map(|i| {
            let (left, right) = side_maxima(profile, i, win);
            let depth = left.min(right) - profile[i];
            (depth > 0.0).then_some((i, depth))
        })
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut picked: Vec<Candidate> = Vec::new();
    for (x, _) in ranked {
        if picked.len() == wanted {
            break;
        }
        let too_close = existing
            .iter()
            .chain(picked.iter())
            .any(|c| c.x.abs_diff(x) < min_distance);
        if !too_close {
            picked.push(Candidate {
                x,
                value: profile[x],
                run: 1,
            });
        }
    }
    picked
}

/// Sort and drop candidates closer than `min_distance`, keeping the deeper
/// one (the wider run on equal depth).
fn prune_close(mut candidates: Vec<Candidate>, min_distance: usize) -> Vec<Candidate> {
    candidates.sort_by_key(|c| c.x);
    candidates.dedup_by_key(|c| c.x);
    let mut i = 0;
    while i + 1 < candidates.len() {
        if candidates[i + 1].x - candidates[i].x < min_distance {
            let (a, b) = (&candidates[i], &candidates[i + 1]);
            let drop_left = a.value > b.value || (a.value == b.value && a.run < b.run);
            if drop_left {
                candidates.remove(i);
            } else {
                candidates.remove(i + 1);
            }
        } else {
            i += 1;
        }
    }
    candidates
}

fn width_spread(boundaries: &[usize], width: usize) -> f64 {
    let mut widths = Vec::with_capacity(boundaries.len() + 1);
    let mut prev = 0usize;
    for &b in boundaries {
        widths.push(b as f64 - prev as f64);
        prev = b;
    }
    widths.push(width as f64 - prev as f64);
    crate::stats::std_dev(&widths)
}

/// Choose `k` boundaries whose columns have the most even widths.
///
/// Exhaustive over at most [`MAX_VALLEY_CANDIDATES`] candidates; when more
/// are supplied only the deepest ones are considered.
fn select_even_subset(mut candidates: Vec<Candidate>, k: usize, width: usize) -> Vec<usize> {
    if candidates.len() > MAX_VALLEY_CANDIDATES {
        candidates.sort_by(|a, b| a.value.total_cmp(&b.value).then(a.x.cmp(&b.x)));
        candidates.truncate(MAX_VALLEY_CANDIDATES);
    }
    let mut xs: Vec<usize> = candidates.iter().map(|c| c.x).collect();
    xs.sort_unstable();
    if k == 0 || xs.len() <= k {
        return xs;
    }

    let n = xs.len();
    let mut idx: Vec<usize> = (0..k).collect();
    let mut best: Vec<usize> = idx.iter().map(|&i| xs[i]).collect();
    let mut best_score = width_spread(&best, width);
    loop {
        // Advance to the next lexicographic combination.
        let mut pos = k;
        while pos > 0 && idx[pos - 1] == n - k + pos - 1 {
            pos -= 1;
        }
        if pos == 0 {
            break;
        }
        idx[pos - 1] += 1;
        for j in pos..k {
            idx[j] = idx[j - 1] + 1;
        }
        let chosen: Vec<usize> = idx.iter().map(|&i| xs[i]).collect();
        let score = width_spread(&chosen, width);
        if score < best_score {
            best_score = score;
            best = chosen;
        }
    }
    best
}

fn regions_from_boundaries(boundaries: &[usize], width: u32) -> Vec<ColumnRegion> {
    let mut regions = Vec::with_capacity(boundaries.len() + 1);
    let mut start = 0u32;
    for &b in boundaries {
        regions.push(ColumnRegion {
            x_start: start,
            x_end: b as u32,
        });
        start = b as u32;
    }
    regions.push(ColumnRegion {
        x_start: start,
        x_end: width,
    });
    regions
}

pub(crate) fn uniform_regions(width: u32, columns: usize) -> Vec<ColumnRegion> {
    let w = width as usize;
    (0..columns)
        .map(|i| ColumnRegion {
            x_start: (i * w / columns) as u32,
            x_end: ((i + 1) * w / columns) as u32,
        })
        .collect()
}

/// Split the sheet into `columns` contiguous regions covering `[0, width)`.
pub fn segment_columns(
    mask: &GrayImage,
    columns: usize,
    cfg: &ColumnSegmentConfig,
) -> ColumnSegmentation {
    let (w, _) = mask.dimensions();
    if columns <= 1 || w == 0 {
        return ColumnSegmentation {
            regions: vec![ColumnRegion {
                x_start: 0,
                x_end: w,
            }],
            method: SegmentMethod::Single,
        };
    }
    let uniform = || ColumnSegmentation {
        regions: uniform_regions(w, columns),
        method: SegmentMethod::Uniform,
    };

    let width = w as usize;
    let needed = columns - 1;
    let win = (width / 100).max(5);
    let mut profile = moving_average(&vertical_projection(mask), win);
    if !normalize_by_max(&mut profile) {
        tracing::debug!("columns: blank projection, dividing evenly");
        return uniform();
    }

    let mut candidates = find_valleys(&profile, win, cfg);
    let mut method = SegmentMethod::Valleys;
    tracing::debug!("columns: {} projection valleys", candidates.len());

    if candidates.len() < needed && cfg.structural {
        let spans = structural_spans(mask, columns, cfg);
        if spans.len() >= 2 {
            let mut corroborated: Vec<Candidate> = spans
                .windows(2)
                .map(|pair| {
                    let x = ((pair[0].1 + pair[1].0) / 2.0).round() as usize;
                    let x = x.min(width - 1);
                    Candidate {
                        x,
                        value: profile[x],
                        run: ((pair[1].0 - pair[0].1).max(1.0)) as usize,
                    }
                })
                .collect();
            corroborated.extend(
                candidates
                    .iter()
                    .filter(|c| {
                        let x = c.x as f64;
                        !spans.iter().any(|s| x >= s.0 && x < s.1)
                    })
                    .copied(),
            );
            tracing::debug!(
                "columns: {} structural spans, {} candidates",
                spans.len(),
                corroborated.len()
            );
            candidates = corroborated;
            method = SegmentMethod::Structural;
        }
    }

    let min_distance = width / (columns * 2);
    if candidates.len() < needed && cfg.shallow_supplement {
        let extra = shallow_valleys(
            &profile,
            win,
            &candidates,
            min_distance,
            needed - candidates.len(),
        );
        if !extra.is_empty() {
            method = SegmentMethod::Shallow;
        }
        candidates.extend(extra);
    }

    let candidates = prune_close(candidates, min_distance);
    if candidates.len() < needed {
        tracing::warn!(
            "columns: found {} of {} boundaries, dividing evenly",
            candidates.len(),
            needed
        );
        return uniform();
    }

    let boundaries = select_even_subset(candidates, needed, width);
    let regions = regions_from_boundaries(&boundaries, w);
    tracing::info!(
        "columns: {} regions via {:?} at {:?}",
        regions.len(),
        method,
        boundaries
    );
    ColumnSegmentation { regions, method }
}

/// Guess how many answer columns the sheet has (1, 2 or 3).
pub fn detect_column_count(mask: &GrayImage) -> usize {
    let width = mask.width() as usize;
    let mut projection = vertical_projection(mask);
    normalize_by_max(&mut projection);
    let win = (width / 100).max(10);
    let smooth = moving_average(&projection, win);

    let significant = (1..smooth.len().saturating_sub(1))
        .filter(|&i| smooth[i] < smooth[i - 1] && smooth[i] < smooth[i + 1] && smooth[i] < 0.3)
        .count();
    tracing::debug!("column count: {} significant minima", significant);
    match significant {
        0 => 1,
        1 => 2,
        _ => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn block_mask(w: u32, h: u32, blocks: &[(u32, u32)]) -> GrayImage {
        GrayImage::from_fn(w, h, |x, _| {
            let on = blocks.iter().any(|&(a, b)| x >= a && x < b);
            Luma([if on { 255 } else { 0 }])
        })
    }

    /// Column `x` is inked from the top down to a height that grows with the
    /// distance to the nearest gutter centre (placed between two pixels).
    fn v_gutter_mask(w: u32, h: u32, gutters: &[u32]) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let dist = gutters
                .iter()
                .map(|&g| (x as f64 - (g as f64 + 0.5)).abs())
                .fold(f64::INFINITY, f64::min);
            let height = (h as f64 * (dist / 15.0).min(1.0)).round() as u32;
            Luma([if y < height { 255 } else { 0 }])
        })
    }

    fn assert_partition(regions: &[ColumnRegion], width: u32, count: usize) {
        assert_eq!(regions.len(), count);
        assert_eq!(regions[0].x_start, 0);
        assert_eq!(regions[count - 1].x_end, width);
        for pair in regions.windows(2) {
            assert_eq!(pair[0].x_end, pair[1].x_start);
        }
        assert!(regions.iter().all(|r| r.width() > 0));
    }

    #[test]
    fn moving_average_is_centered_with_zero_padding() {
        let out = moving_average(&[0.0, 0.0, 5.0, 0.0, 0.0], 5);
        assert_eq!(out, vec![1.0, 1.0, 1.0, 1.0, 1.0]);
        let out = moving_average(&[6.0, 0.0, 0.0, 0.0], 2);
        assert_eq!(out, vec![3.0, 3.0, 0.0, 0.0]);
    }

    #[test]
    fn valleys_collapse_runs_and_skip_short_profiles() {
        let cfg = ColumnSegmentConfig::default();
        assert!(find_valleys(&[0.0; 20], 10, &cfg).is_empty());
        assert!(find_valleys(&[1.0, 0.0, 1.0], 2, &cfg).is_empty());

        let mut profile = vec![1.0; 100];
        for v in &mut profile[48..52] {
            *v = 0.0;
        }
        let valleys = find_valleys(&profile, 10, &cfg);
        assert_eq!(valleys.len(), 1);
        assert_eq!(valleys[0].x, 49);
        assert_eq!(valleys[0].run, 4);
        assert_eq!(valleys[0].value, 0.0);
    }

    #[test]
    fn gutters_become_boundaries() {
        let mask = block_mask(300, 100, &[(10, 90), (110, 190), (210, 290)]);
        let seg = segment_columns(&mask, 3, &ColumnSegmentConfig::default());
        assert_partition(&seg.regions, 300, 3);
        assert_eq!(seg.method, SegmentMethod::Valleys);
        assert!((90..=110).contains(&seg.regions[0].x_end), "{:?}", seg.regions);
        assert!((190..=210).contains(&seg.regions[1].x_end), "{:?}", seg.regions);
    }

    #[test]
    fn single_column_covers_full_width() {
        let mask = block_mask(120, 40, &[(10, 100)]);
        let seg = segment_columns(&mask, 1, &ColumnSegmentConfig::default());
        assert_eq!(
            seg.regions,
            vec![ColumnRegion {
                x_start: 0,
                x_end: 120
            }]
        );
    }

    #[test]
    fn blank_sheet_divides_evenly() {
        let mask = GrayImage::new(301, 50);
        let seg = segment_columns(&mask, 3, &ColumnSegmentConfig::default());
        assert_eq!(seg.method, SegmentMethod::Uniform);
        assert_partition(&seg.regions, 301, 3);
        assert_eq!(seg.regions[1].x_start, 100);
        assert_eq!(seg.regions[2].x_start, 200);
    }

    #[test]
    fn solid_ink_falls_back_to_uniform_partition() {
        let mask = block_mask(200, 60, &[(0, 200)]);
        let cfg = ColumnSegmentConfig {
            structural: false,
            ..Default::default()
        };
        let seg = segment_columns(&mask, 4, &cfg);
        assert_partition(&seg.regions, 200, 4);
    }

    #[test]
    fn even_subset_prefers_balanced_widths() {
        let cands = [12, 95, 101, 199, 205, 280]
            .iter()
            .map(|&x| Candidate { x, value: 0.0, run: 1 })
            .collect();
        let picked = select_even_subset(cands, 2, 300);
        assert_eq!(picked, vec![101, 199]);
    }

    #[test]
    fn candidate_search_is_bounded_to_deepest() {
        let cands: Vec<Candidate> = (0..14)
            .map(|i| Candidate {
                x: 20 + i * 20,
                value: if i % 2 == 0 { 0.01 } else { 0.1 },
                run: 1,
            })
            .collect();
        let picked = select_even_subset(cands, 2, 300);
        assert_eq!(picked.len(), 2);
        // Only the seven deep candidates and three shallow ones can be chosen.
        for x in &picked {
            let i = (x - 20) / 20;
            assert!(i % 2 == 0 || i <= 5, "picked {}", x);
        }
    }

    #[test]
    fn close_candidates_keep_the_deeper() {
        let pruned = prune_close(
            vec![
                Candidate { x: 100, value: 0.1, run: 1 },
                Candidate { x: 110, value: 0.02, run: 1 },
                Candidate { x: 200, value: 0.05, run: 1 },
            ],
            50,
        );
        let xs: Vec<usize> = pruned.iter().map(|c| c.x).collect();
        assert_eq!(xs, vec![110, 200]);
    }

    #[test]
    fn equal_depth_keeps_the_wider_gutter() {
        let pruned = prune_close(
            vec![
                Candidate { x: 60, value: 0.0, run: 11 },
                Candidate { x: 100, value: 0.0, run: 50 },
            ],
            120,
        );
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].x, 100);
    }

    #[test]
    fn tall_blobs_produce_structural_spans() {
        let mask = block_mask(300, 100, &[(20, 130), (170, 280)]);
        let spans = structural_spans(&mask, 2, &ColumnSegmentConfig::default());
        assert_eq!(spans.len(), 2);
        assert!(spans[0].1 <= 140.0 && spans[1].0 >= 160.0, "{:?}", spans);
    }

    #[test]
    fn column_count_from_v_shaped_gutters() {
        let three = v_gutter_mask(300, 100, &[100, 200]);
        assert_eq!(detect_column_count(&three), 3);
        let two = v_gutter_mask(300, 100, &[150]);
        assert_eq!(detect_column_count(&two), 2);
        let one = block_mask(300, 100, &[(0, 300)]);
        assert_eq!(detect_column_count(&one), 1);
    }
}
