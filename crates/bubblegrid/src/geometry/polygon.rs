//! Planar polygon helpers over contour point chains.

use imageproc::contours::Contour;

pub(crate) type Point = [f64; 2];

/// Axis-aligned pixel bounding box; `w`/`h` count pixels (inclusive extent).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl PixelRect {
    pub fn center(&self) -> Point {
        [self.x + (self.w / 2.0).floor(), self.y + (self.h / 2.0).floor()]
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            [self.x, self.y],
            [self.x + self.w, self.y],
            [self.x + self.w, self.y + self.h],
            [self.x, self.y + self.h],
        ]
    }
}

pub(crate) fn contour_points<T>(contour: &Contour<T>) -> Vec<Point>
where
    T: Copy + Into<f64>,
{
    contour
        .points
        .iter()
        .map(|p| [p.x.into(), p.y.into()])
        .collect()
}

/// Absolute shoelace area of a closed polygon.
pub(crate) fn area(points: &[Point]) -> f64 {
    signed_area(points).abs()
}

fn signed_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        acc += a[0] * b[1] - b[0] * a[1];
    }
    0.5 * acc
}

/// Closed perimeter.
pub(crate) fn perimeter(points: &[Point]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    (0..points.len())
        .map(|i| distance(points[i], points[(i + 1) % points.len()]))
        .sum()
}

pub(crate) fn distance(a: Point, b: Point) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

pub(crate) fn bounding_rect(points: &[Point]) -> Option<PixelRect> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first[0], first[1], first[0], first[1]);
    for p in &points[1..] {
        min_x = min_x.min(p[0]);
        min_y = min_y.min(p[1]);
        max_x = max_x.max(p[0]);
        max_y = max_y.max(p[1]);
    }
    Some(PixelRect {
        x: min_x,
        y: min_y,
        w: max_x - min_x + 1.0,
        h: max_y - min_y + 1.0,
    })
}

/// Area centroid from polygon moments; `None` when the polygon has no area.
pub(crate) fn centroid(points: &[Point]) -> Option<Point> {
    let a = signed_area(points);
    if a.abs() < 1e-12 {
        return None;
    }
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..points.len() {
        let p = points[i];
        let q = points[(i + 1) % points.len()];
        let cross = p[0] * q[1] - q[0] * p[1];
        cx += (p[0] + q[0]) * cross;
        cy += (p[1] + q[1]) * cross;
    }
    Some([cx / (6.0 * a), cy / (6.0 * a)])
}

fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let len = distance(a, b);
    if len < 1e-12 {
        return distance(p, a);
    }
    ((b[0] - a[0]) * (a[1] - p[1]) - (a[0] - p[0]) * (b[1] - a[1])).abs() / len
}

fn douglas_peucker(points: &[Point], epsilon: f64, out: &mut Vec<Point>) {
    if points.len() < 3 {
        return;
    }
    let first = points[0];
    let last = points[points.len() - 1];
    let (split, max_d) = points[1..points.len() - 1]
        .iter()
        .enumerate()
        .map(|(i, &p)| (i + 1, perpendicular_distance(p, first, last)))
        .fold((0, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });
    if max_d > epsilon {
        douglas_peucker(&points[..=split], epsilon, out);
        out.push(points[split]);
        douglas_peucker(&points[split..], epsilon, out);
    }
}

/// Douglas-Peucker simplification of a closed curve.
///
/// The curve is split at the vertex farthest from the first one so both
/// halves are simplified as open chains.
pub(crate) fn approximate_closed_polygon(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let start = points[0];
    let far = (1..points.len())
        .max_by(|&a, &b| distance(points[a], start).total_cmp(&distance(points[b], start)))
        .unwrap_or(0);

    let first_half: Vec<Point> = points[..=far].to_vec();
    let mut second_half: Vec<Point> = points[far..].to_vec();
    second_half.push(start);

    let mut out = vec![start];
    douglas_peucker(&first_half, epsilon, &mut out);
    out.push(points[far]);
    douglas_peucker(&second_half, epsilon, &mut out);

    out.dedup_by(|a, b| distance(*a, *b) < 1e-9);
    if out.len() > 1 && distance(out[0], out[out.len() - 1]) < 1e-9 {
        out.pop();
    }
    out
}

/// Convex hull via Andrew's monotone chain, counter-clockwise in image coordinates.
pub(crate) fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }
    fn cross(o: Point, a: Point, b: Point) -> f64 {
        (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
    }
    let mut lower: Vec<Point> = Vec::with_capacity(pts.len());
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<Point> = Vec::with_capacity(pts.len());
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(side: f64) -> Vec<Point> {
        vec![[0.0, 0.0], [side, 0.0], [side, side], [0.0, side]]
    }

    fn dense_square(side: usize) -> Vec<Point> {
        let s = side as f64;
        let mut pts = Vec::new();
        for i in 0..side {
            pts.push([i as f64, 0.0]);
        }
        for i in 0..side {
            pts.push([s, i as f64]);
        }
        for i in 0..side {
            pts.push([s - i as f64, s]);
        }
        for i in 0..side {
            pts.push([0.0, s - i as f64]);
        }
        pts
    }

    #[test]
    fn area_perimeter_and_centroid_of_square() {
        let sq = square(10.0);
        assert_relative_eq!(area(&sq), 100.0);
        assert_relative_eq!(perimeter(&sq), 40.0);
        let c = centroid(&sq).unwrap();
        assert_relative_eq!(c[0], 5.0);
        assert_relative_eq!(c[1], 5.0);
    }

    #[test]
    fn degenerate_polygon_has_no_centroid() {
        let line = vec![[0.0, 0.0], [5.0, 0.0], [10.0, 0.0]];
        assert!(centroid(&line).is_none());
        assert_eq!(area(&line), 0.0);
    }

    #[test]
    fn dp_reduces_dense_square_to_four_corners() {
        let pts = dense_square(40);
        let eps = 0.02 * perimeter(&pts);
        let approx = approximate_closed_polygon(&pts, eps);
        assert_eq!(approx.len(), 4, "got {:?}", approx);
    }

    #[test]
    fn hull_drops_interior_points() {
        let mut pts = square(10.0);
        pts.push([5.0, 5.0]);
        pts.push([2.0, 7.0]);
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
        assert_relative_eq!(area(&hull), 100.0);
    }

    #[test]
    fn bounding_rect_counts_pixels_inclusively() {
        let r = bounding_rect(&[[2.0, 3.0], [11.0, 3.0], [11.0, 12.0]]).unwrap();
        assert_eq!((r.x, r.y, r.w, r.h), (2.0, 3.0, 10.0, 10.0));
        assert_eq!(r.center(), [7.0, 8.0]);
    }
}
