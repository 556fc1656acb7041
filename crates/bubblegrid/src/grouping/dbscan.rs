//! One-dimensional DBSCAN over bubble y coordinates.

/// Label assigned to points that belong to no cluster.
pub(crate) const NOISE: i32 = -1;

/// Cluster `values` with neighbourhood `|a - b| <= eps`.
///
/// A point is a core point when its neighbourhood (itself included) holds at
/// least `min_samples` points. Clusters are seeded from core points in input
/// order; border points join the first cluster that reaches them.
pub(crate) fn dbscan_1d(values: &[f64], eps: f64, min_samples: usize) -> Vec<i32> {
    let n = values.len();
    let neighbours: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| (values[i] - values[j]).abs() <= eps)
                .collect()
        })
        .collect();
    let is_core: Vec<bool> = neighbours.iter().map(|nb| nb.len() >= min_samples).collect();

    let mut labels = vec![NOISE; n];
    let mut next_label = 0;
    for seed in 0..n {
        if labels[seed] != NOISE || !is_core[seed] {
            continue;
        }
        labels[seed] = next_label;
        let mut stack = vec![seed];
        while let Some(p) = stack.pop() {
            if !is_core[p] {
                continue;
            }
            for &q in &neighbours[p] {
                if labels[q] == NOISE {
                    labels[q] = next_label;
                    stack.push(q);
                }
            }
        }
        next_label += 1;
    }
    labels
}

/// Number of distinct non-noise labels.
pub(crate) fn cluster_count(labels: &[i32]) -> usize {
    labels
        .iter()
        .filter(|&&l| l != NOISE)
        .max()
        .map_or(0, |&m| m as usize + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separated_rows_form_clusters() {
        let ys = [10.0, 11.0, 12.0, 50.0, 51.0, 90.0, 10.5];
        let labels = dbscan_1d(&ys, 5.0, 2);
        assert_eq!(cluster_count(&labels), 2);
        assert_eq!(labels[0], labels[6]);
        assert_eq!(labels[3], labels[4]);
        assert_ne!(labels[0], labels[3]);
        assert_eq!(labels[5], NOISE);
    }

    #[test]
    fn chains_connect_through_core_points() {
        let ys = [0.0, 4.0, 8.0, 12.0];
        let labels = dbscan_1d(&ys, 4.0, 2);
        assert!(labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn min_samples_one_makes_every_point_a_cluster_seed() {
        let ys = [0.0, 100.0];
        let labels = dbscan_1d(&ys, 1.0, 1);
        assert_eq!(labels, vec![0, 1]);
    }
}
