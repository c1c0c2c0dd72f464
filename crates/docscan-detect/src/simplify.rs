//! Closed-polygon simplification on top of `imageproc`'s Douglas-Peucker.

use imageproc::geometry::approximate_polygon_dp;
use imageproc::point::Point;

/// Simplify a closed polygon so that no dropped point lies further than
/// `epsilon` from the kept outline.
///
/// The ring is cut at its first point and the point farthest from it, and
/// each half goes through the open-curve reduction; the cut points always
/// survive. A non-positive `epsilon` only drops exactly collinear points.
pub fn simplify_closed(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    let n = points.len();
    if n < 4 {
        return points.to_vec();
    }

    let anchor = points[0];
    let dist2 = |p: &Point<i32>| {
        let (dx, dy) = ((p.x - anchor.x) as i64, (p.y - anchor.y) as i64);
        dx * dx + dy * dy
    };
    let Some((far, far_dist)) = points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, dist2(p)))
        .max_by_key(|&(_, d)| d)
    else {
        return Vec::new();
    };
    if far_dist == 0 {
        return vec![anchor];
    }

    let epsilon = epsilon.max(f64::MIN_POSITIVE);
    let mut back: Vec<Point<i32>> = points[far..].to_vec();
    back.push(anchor);

    let mut out = approximate_polygon_dp(&points[..=far], epsilon, false);
    out.pop();
    out.extend(approximate_polygon_dp(&back, epsilon, false));
    out.pop();
    out
}
