//! Interior fill measurement.

use image::GrayImage;

/// Foreground fraction inside the disk of radius `radius` around `center`.
///
/// Pixels count as inside when their centre lies within the disk. Returns
/// `None` when the disk covers no pixel of the image.
pub(crate) fn disk_fill_rate(mask: &GrayImage, center: [f64; 2], radius: f64) -> Option<f64> {
    let (w, h) = mask.dimensions();
    if radius <= 0.0 || w == 0 || h == 0 {
        return None;
    }
    let r2 = radius * radius;
    let x0 = (center[0] - radius).floor().max(0.0) as u32;
    let y0 = (center[1] - radius).floor().max(0.0) as u32;
    let x1 = ((center[0] + radius).ceil().max(0.0) as u32).min(w - 1);
    let y1 = ((center[1] + radius).ceil().max(0.0) as u32).min(h - 1);

    let mut total = 0usize;
    let mut on = 0usize;
    for y in y0..=y1 {
        let dy = y as f64 - center[1];
        for x in x0..=x1 {
            let dx = x as f64 - center[0];
            if dx * dx + dy * dy > r2 {
                continue;
            }
            total += 1;
            if mask.get_pixel(x, y)[0] > 0 {
                on += 1;
            }
        }
    }
    (total > 0).then(|| on as f64 / total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::draw_disks;
    use approx::assert_relative_eq;

    #[test]
    fn solid_disk_is_fully_filled() {
        let mask = draw_disks(60, 60, &[([30.0, 30.0], 12.0)], &[]);
        assert_relative_eq!(disk_fill_rate(&mask, [30.0, 30.0], 9.6).unwrap(), 1.0);
    }

    #[test]
    fn hollow_ring_interior_is_nearly_empty() {
        let mask = draw_disks(60, 60, &[], &[([30.0, 30.0], 12.0)]);
        let fill = disk_fill_rate(&mask, [30.0, 30.0], 9.6).unwrap();
        assert!(fill < 0.05, "fill {}", fill);
    }

    #[test]
    fn disk_outside_image_has_no_fill() {
        let mask = GrayImage::new(20, 20);
        assert!(disk_fill_rate(&mask, [10.0, 10.0], 0.0).is_none());
        assert_eq!(disk_fill_rate(&mask, [10.0, 10.0], 3.0), Some(0.0));
    }
}
