//! Canonical corner order: top-left, top-right, bottom-right, bottom-left.

use docscan_core::{is_strictly_convex, Quadrilateral};
use nalgebra::Point2;

/// Why four points cannot be put into document order.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderError {
    #[error("three or more corners are collinear or coincide")]
    Collinear,
    #[error("corners do not form a convex quadrilateral")]
    NotConvex,
}

/// Relative area below which a corner triple counts as collinear.
const COLLINEAR_EPS: f32 = 1e-6;

/// True when any three of the four points span (almost) no area, relative
/// to the squared diagonal of their bounding box. Non-finite input counts
/// as degenerate too.
pub(crate) fn has_collinear_triple(pts: &[Point2<f32>; 4]) -> bool {
    if pts.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return true;
    }
    let (min_x, max_x, min_y, max_y) = pts.iter().fold(
        (f32::INFINITY, f32::NEG_INFINITY, f32::INFINITY, f32::NEG_INFINITY),
        |(a, b, c, d), p| (a.min(p.x), b.max(p.x), c.min(p.y), d.max(p.y)),
    );
    let diag2 = (max_x - min_x).powi(2) + (max_y - min_y).powi(2);
    if diag2 <= 0.0 {
        return true;
    }

    let tri = |a: Point2<f32>, b: Point2<f32>, c: Point2<f32>| {
        ((b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)).abs()
    };
    [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)]
        .iter()
        .any(|&(i, j, k)| tri(pts[i], pts[j], pts[k]) <= COLLINEAR_EPS * diag2)
}

/// Reorder the corners of `quad` into TL, TR, BR, BL (clockwise on screen).
///
/// Points are sorted by angle around their centroid, then the rotation is
/// chosen so that `TL.x < TR.x` and `TL.y < BL.y`. When two rotations both
/// qualify (a square rotated by 45 degrees) the one whose top-left has the
/// smallest `x + y` wins, then smaller `x`, then smaller `y`.
pub fn order_corners(quad: &Quadrilateral) -> Result<Quadrilateral, OrderError> {
    let pts = quad.corners;
    if has_collinear_triple(&pts) {
        return Err(OrderError::Collinear);
    }

    let c = quad.centroid();
    let mut idx = [0usize, 1, 2, 3];
    // atan2 grows clockwise on a y-down raster
    idx.sort_by(|&a, &b| {
        let ta = (pts[a].y - c.y).atan2(pts[a].x - c.x);
        let tb = (pts[b].y - c.y).atan2(pts[b].x - c.x);
        ta.total_cmp(&tb).then(a.cmp(&b))
    });
    let sorted = idx.map(|i| pts[i]);
    if !is_strictly_convex(&sorted) {
        return Err(OrderError::NotConvex);
    }

    let rotation = |r: usize| -> [Point2<f32>; 4] { std::array::from_fn(|k| sorted[(r + k) % 4]) };
    let key = |q: &[Point2<f32>; 4]| (q[0].x + q[0].y, q[0].x, q[0].y);
    let best = (0..4)
        .map(rotation)
        .filter(|q| q[0].x < q[1].x && q[0].y < q[3].y)
        .min_by(|a, b| {
            let (ka, kb) = (key(a), key(b));
            ka.0.total_cmp(&kb.0)
                .then(ka.1.total_cmp(&kb.1))
                .then(ka.2.total_cmp(&kb.2))
        })
        // the vertex minimizing x + y always qualifies on a convex polygon
        .unwrap_or_else(|| {
            (0..4)
                .map(rotation)
                .min_by(|a, b| key(a).0.total_cmp(&key(b).0))
                .unwrap_or(sorted)
        });

    Ok(Quadrilateral::new(best))
}
