use super::bubble::{Bubble, BubbleSource};

/// Lower ranks survive a proximity conflict.
fn source_rank(source: BubbleSource) -> u8 {
    match source {
        BubbleSource::Circle => 0,
        BubbleSource::Contour => 1,
        BubbleSource::Synthetic => 2,
    }
}

/// Drop bubbles closer than `radius` to a stronger one.
///
/// Circle-pass bubbles beat contour-pass bubbles, which beat synthetic
/// placeholders; within a source, earlier entries win. Survivors keep their
/// input order.
pub(crate) fn dedup_by_proximity(bubbles: Vec<Bubble>, radius: f64) -> Vec<Bubble> {
    let mut order: Vec<usize> = (0..bubbles.len()).collect();
    order.sort_by_key(|&i| source_rank(bubbles[i].source));

    let mut keep = vec![false; bubbles.len()];
    let mut kept: Vec<usize> = Vec::with_capacity(bubbles.len());
    for i in order {
        if kept.iter().all(|&k| bubbles[k].distance_to(&bubbles[i]) >= radius) {
            keep[i] = true;
            kept.push(i);
        }
    }

    bubbles
        .into_iter()
        .zip(keep)
        .filter_map(|(bubble, keep)| keep.then_some(bubble))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bubble(x: f64, y: f64, source: BubbleSource) -> Bubble {
        Bubble {
            center: [x, y],
            radius: 10.0,
            fill_rate: 0.0,
            filled: false,
            source,
            contour: None,
        }
    }

    #[test]
    fn first_detection_wins_within_radius() {
        let out = dedup_by_proximity(
            vec![
                bubble(10.0, 10.0, BubbleSource::Circle),
                bubble(25.0, 10.0, BubbleSource::Contour),
                bubble(45.0, 10.0, BubbleSource::Contour),
            ],
            20.0,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].source, BubbleSource::Circle);
        assert_eq!(out[1].center, [45.0, 10.0]);
    }

    #[test]
    fn circle_beats_an_earlier_contour() {
        let out = dedup_by_proximity(
            vec![
                bubble(10.0, 10.0, BubbleSource::Contour),
                bubble(60.0, 10.0, BubbleSource::Synthetic),
                bubble(14.0, 10.0, BubbleSource::Circle),
                bubble(64.0, 10.0, BubbleSource::Contour),
            ],
            20.0,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].center, [14.0, 10.0]);
        assert_eq!(out[0].source, BubbleSource::Circle);
        assert_eq!(out[1].source, BubbleSource::Contour);
    }

    #[test]
    fn exact_radius_is_not_a_conflict() {
        let out = dedup_by_proximity(
            vec![bubble(0.0, 0.0, BubbleSource::Circle), bubble(20.0, 0.0, BubbleSource::Circle)],
            20.0,
        );
        assert_eq!(out.len(), 2);
    }
}
