//! Reduce contours to 4-vertex candidates, score them, keep the best one.
//!
//! Scoring is a weighted mean of three terms, each in `[0, 1]`:
//! - area: candidate area over image area;
//! - convexity: how well the contour fills its convex hull, times how well
//!   the quadrilateral covers that hull;
//! - aspect: closeness to `aspect_ratio_hint` when given, otherwise how
//!   parallel-sided (equal opposite sides) the candidate is.
//!
//! Candidates that are not strictly convex or enclose less than
//! `min_area_fraction` of the image never get a score.

use crate::contour::{pixel_center, Contour};
use crate::simplify::simplify_closed;
use crate::QuadParams;
use docscan_core::{area, is_strictly_convex, perimeter, Quadrilateral};
use imageproc::geometry::convex_hull;
use imageproc::point::Point;
use nalgebra::{Point2, Vector2};

/// Outcome of quadrilateral selection.
#[derive(Clone, Debug, PartialEq)]
pub struct QuadSelection {
    /// Accepted quadrilateral (hull order, not yet canonical).
    pub quad: Option<Quadrilateral>,
    /// Score of the best valid candidate, or `0.0` if there was none.
    pub confidence: f32,
    /// Number of contours that produced a valid candidate.
    pub candidates: usize,
}

fn hull(border: &[Point<i32>]) -> Vec<Point<i32>> {
    let mut pts = border.to_vec();
    pts.sort_unstable_by_key(|p| (p.x, p.y));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }
    convex_hull(pts.as_slice())
}

fn centers(points: &[Point<i32>]) -> Vec<Point2<f32>> {
    points.iter().map(pixel_center).collect()
}

/// Approximate a traced border with exactly four vertices, at pixel centers.
///
/// The border's convex hull is simplified with a tolerance that starts at
/// `initial_epsilon_ratio * perimeter` and is bracketed: doubled while there
/// are too many vertices, bisected once a tolerance with too few is known.
/// Gives up after `max_approx_iterations` steps.
pub fn approximate_quad(border: &[Point<i32>], params: &QuadParams) -> Option<[Point2<f32>; 4]> {
    let hull = hull(border);
    if hull.len() < 4 {
        return None;
    }
    let as_quad = |pts: &[Point<i32>]| -> Option<[Point2<f32>; 4]> {
        match pts {
            [a, b, c, d] => Some([a, b, c, d].map(pixel_center)),
            _ => None,
        }
    };
    if hull.len() == 4 {
        return as_quad(&hull);
    }

    let mut eps = f64::from(params.initial_epsilon_ratio * perimeter(&centers(&hull))).max(0.5);
    let mut lo = 0.0f64;
    let mut hi: Option<f64> = None;
    for _ in 0..params.max_approx_iterations {
        let approx = simplify_closed(&hull, eps);
        match approx.len() {
            4 => return as_quad(&approx),
            n if n > 4 => {
                lo = eps;
                eps = match hi {
                    Some(h) => 0.5 * (lo + h),
                    None => eps * 2.0,
                };
            }
            _ => {
                hi = Some(eps);
                eps = 0.5 * (lo + eps);
            }
        }
    }
    None
}

#[derive(Clone, Copy, Debug)]
struct Line {
    point: Point2<f32>,
    dir: Vector2<f32>,
}

impl Line {
    fn through(a: Point2<f32>, b: Point2<f32>) -> Option<Self> {
        let d = b - a;
        let len = d.norm();
        (len > f32::EPSILON).then(|| Line {
            point: a,
            dir: d / len,
        })
    }

    fn distance(&self, p: Point2<f32>) -> f32 {
        let v = p - self.point;
        (v.x * self.dir.y - v.y * self.dir.x).abs()
    }

    fn intersect(&self, other: &Line) -> Option<Point2<f32>> {
        let denom = self.dir.x * other.dir.y - self.dir.y * other.dir.x;
        if denom.abs() < 1e-6 {
            return None;
        }
        let w = other.point - self.point;
        let t = (w.x * other.dir.y - w.y * other.dir.x) / denom;
        Some(self.point + self.dir * t)
    }
}

/// Total least squares line through the border pixels that run along side
/// `a -> b`. Pixels within `max(10% of the side, tol)` of either corner are
/// left out: that is where rounded or gap-filled corners bend away from
/// the side. `None` when too few pixels support the side.
fn fit_side(border: &[Point2<f32>], a: Point2<f32>, b: Point2<f32>) -> Option<Line> {
    let side = Line::through(a, b)?;
    let len = (b - a).norm();
    let tol = 2.0 + 0.01 * len;
    let margin = (0.1 * len).max(tol);
    let span = len - 2.0 * margin;
    if span <= 0.0 {
        return None;
    }

    let support: Vec<Point2<f32>> = border
        .iter()
        .copied()
        .filter(|&p| {
            let along = (p - a).dot(&side.dir);
            side.distance(p) <= tol && along >= margin && along <= len - margin
        })
        .collect();
    // 8-connected runs put at least one pixel per `1 / sqrt(2)` of length
    if (support.len() as f32) < 0.5 * span {
        return None;
    }

    let n = support.len() as f32;
    let mean = support.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords) / n;
    let (mut sxx, mut sxy, mut syy) = (0.0f32, 0.0f32, 0.0f32);
    for p in &support {
        let d = p.coords - mean;
        sxx += d.x * d.x;
        sxy += d.x * d.y;
        syy += d.y * d.y;
    }
    let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    Some(Line {
        point: Point2::from(mean),
        dir: Vector2::new(theta.cos(), theta.sin()),
    })
}

/// Re-fit each side to the border and intersect neighbouring sides.
///
/// Each corner moves at most `max(4, 5% of the shortest side)` pixels; the
/// refined quad must stay convex and keep at least `min_area`. Otherwise the
/// input corners are returned unchanged.
pub fn refine_corners(
    corners: [Point2<f32>; 4],
    border: &[Point2<f32>],
    min_area: f32,
) -> [Point2<f32>; 4] {
    let lines: [Option<Line>; 4] = std::array::from_fn(|i| {
        let (a, b) = (corners[i], corners[(i + 1) % 4]);
        fit_side(border, a, b).or_else(|| Line::through(a, b))
    });
    let shortest = Quadrilateral::new(corners)
        .side_lengths()
        .into_iter()
        .fold(f32::INFINITY, f32::min);
    let max_shift = (0.05 * shortest).max(4.0);

    let mut refined = corners;
    for (i, corner) in refined.iter_mut().enumerate() {
        let prev = lines[(i + 3) % 4];
        let next = lines[i];
        if let (Some(l0), Some(l1)) = (prev, next) {
            if let Some(p) = l0.intersect(&l1) {
                if (p - *corner).norm() <= max_shift {
                    *corner = p;
                }
            }
        }
    }

    if is_strictly_convex(&refined) && area(&refined) >= min_area {
        refined
    } else {
        corners
    }
}

fn aspect_score(q: &Quadrilateral, hint: Option<f32>) -> f32 {
    let [top, right, bottom, left] = q.side_lengths();
    match hint {
        Some(hint) => {
            let w = 0.5 * (top + bottom);
            let h = 0.5 * (left + right);
            if w <= 0.0 || h <= 0.0 {
                return 0.0;
            }
            let ratio = w.max(h) / w.min(h);
            let hint = if hint < 1.0 { 1.0 / hint } else { hint };
            (1.0 - (ratio / hint).ln().abs() / std::f32::consts::LN_2).clamp(0.0, 1.0)
        }
        None => {
            let balance = |a: f32, b: f32| {
                if a.max(b) <= 0.0 {
                    0.0
                } else {
                    a.min(b) / a.max(b)
                }
            };
            balance(top, bottom) * balance(left, right)
        }
    }
}

/// Score a candidate against the border it came from, or `None` if it is
/// not a valid document outline.
pub fn score_candidate(
    corners: &[Point2<f32>; 4],
    border: &[Point<i32>],
    image_area: f32,
    params: &QuadParams,
) -> Option<f32> {
    let quad = Quadrilateral::new(*corners);
    let quad_area = quad.area();
    if !quad.is_convex() || quad_area < params.min_area_fraction * image_area {
        return None;
    }

    let area_score = (quad_area / image_area).clamp(0.0, 1.0);
    let hull_area = area(&centers(&hull(border)));
    let convexity = if hull_area > 0.0 {
        let solidity = (area(&centers(border)) / hull_area).clamp(0.0, 1.0);
        let coverage = (quad_area / hull_area).clamp(0.0, 1.0);
        solidity * coverage
    } else {
        0.0
    };
    let aspect = aspect_score(&quad, params.aspect_ratio_hint);

    let weights = params.area_weight + params.convexity_weight + params.aspect_weight;
    let score = (params.area_weight * area_score
        + params.convexity_weight * convexity
        + params.aspect_weight * aspect)
        / weights;
    log::trace!(
        "candidate area={area_score:.3} convexity={convexity:.3} aspect={aspect:.3} -> {score:.3}"
    );
    Some(score.clamp(0.0, 1.0))
}

/// Pick the best-scoring quadrilateral among `contours`.
///
/// Ties go to the larger area, then to the earlier contour. The best
/// candidate is returned only if its score reaches `acceptance_score`; the
/// confidence is reported either way.
pub fn select_quadrilateral<I>(
    contours: I,
    image_width: usize,
    image_height: usize,
    params: &QuadParams,
) -> QuadSelection
where
    I: IntoIterator<Item = Contour>,
{
    let image_area = (image_width * image_height) as f32;
    let min_area = params.min_area_fraction * image_area;
    let mut best: Option<(f32, f32, Quadrilateral)> = None;
    let mut candidates = 0usize;

    for contour in contours {
        let Some(mut corners) = approximate_quad(&contour.border, params) else {
            continue;
        };
        if params.refine_corners {
            corners = refine_corners(corners, &contour.border_centers(), min_area);
        }
        let Some(score) = score_candidate(&corners, &contour.border, image_area, params) else {
            continue;
        };
        candidates += 1;

        let quad = Quadrilateral::new(corners);
        let quad_area = quad.area();
        let better = match &best {
            None => true,
            Some((s, a, _)) => score > *s || (score == *s && quad_area > *a),
        };
        if better {
            best = Some((score, quad_area, quad));
        }
    }

    match best {
        Some((score, _, quad)) => QuadSelection {
            quad: (score >= params.acceptance_score).then_some(quad),
            confidence: score,
            candidates,
        },
        None => QuadSelection {
            quad: None,
            confidence: 0.0,
            candidates,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn p(x: f32, y: f32) -> Point2<f32> {
        Point2::new(x, y)
    }

    fn contour(border: Vec<Point<i32>>) -> Contour {
        let points = centers(&simplify_closed(&border, 0.5));
        let perimeter = perimeter(&centers(&border));
        Contour {
            points,
            border,
            is_hole: false,
            perimeter,
        }
    }

    /// 8-connected pixel ring around `(x0, y0)..=(x1, y1)`, each corner cut
    /// by a `cut`-pixel diagonal.
    fn ring(x0: i32, y0: i32, x1: i32, y1: i32, cut: i32) -> Vec<Point<i32>> {
        let mut pts = Vec::new();
        pts.extend((x0 + cut..x1 - cut).map(|x| Point::new(x, y0)));
        pts.extend((0..cut).map(|i| Point::new(x1 - cut + i, y0 + i)));
        pts.extend((y0 + cut..y1 - cut).map(|y| Point::new(x1, y)));
        pts.extend((0..cut).map(|i| Point::new(x1 - i, y1 - cut + i)));
        pts.extend((x0 + cut + 1..=x1 - cut).rev().map(|x| Point::new(x, y1)));
        pts.extend((0..cut).map(|i| Point::new(x0 + cut - i, y1 - i)));
        pts.extend((y0 + cut + 1..=y1 - cut).rev().map(|y| Point::new(x0, y)));
        pts.extend((0..cut).map(|i| Point::new(x0 + i, y0 + cut - i)));
        pts
    }

    #[test]
    fn approximation_reaches_four_vertices() {
        let border = ring(40, 40, 160, 160, 2);
        let quad = approximate_quad(&border, &QuadParams::default()).expect("quad");
        assert!(Quadrilateral::new(quad).area() > 0.9 * 120.0 * 120.0);
    }

    #[test]
    fn triangles_never_become_quads() {
        let tri = vec![
            Point::new(0, 0),
            Point::new(100, 0),
            Point::new(50, 80),
            Point::new(50, 40),
        ];
        assert!(approximate_quad(&tri, &QuadParams::default()).is_none());
    }

    #[test]
    fn refinement_recovers_sharp_corners() {
        let border = centers(&ring(40, 40, 160, 160, 2));
        let coarse = [p(40.5, 42.5), p(158.5, 40.5), p(160.5, 158.5), p(42.5, 160.5)];
        let refined = refine_corners(coarse, &border, 100.0);
        let expected = [p(40.5, 40.5), p(160.5, 40.5), p(160.5, 160.5), p(40.5, 160.5)];
        for (r, e) in refined.iter().zip(expected) {
            assert_abs_diff_eq!(r.x, e.x, epsilon = 1e-3);
            assert_abs_diff_eq!(r.y, e.y, epsilon = 1e-3);
        }
    }

    #[test]
    fn refinement_ignores_bulging_corners() {
        // extra pixels hugging the top-left corner, as gap closing leaves them
        let mut border = ring(20, 20, 180, 180, 0);
        border.extend([Point::new(21, 21), Point::new(22, 21), Point::new(21, 22)]);
        let border = centers(&border);
        let start = [p(20.5, 20.5), p(180.5, 20.5), p(180.5, 180.5), p(20.5, 180.5)];
        let refined = refine_corners(start, &border, 100.0);
        for (r, e) in refined.iter().zip(start) {
            assert_abs_diff_eq!(r.x, e.x, epsilon = 1e-3);
            assert_abs_diff_eq!(r.y, e.y, epsilon = 1e-3);
        }
    }

    #[test]
    fn short_sides_keep_their_corners() {
        let border = centers(&ring(0, 0, 4, 4, 0));
        let start = [p(0.5, 0.5), p(4.5, 0.5), p(4.5, 4.5), p(0.5, 4.5)];
        assert_eq!(refine_corners(start, &border, 1.0), start);
    }

    #[test]
    fn centered_square_scores_above_acceptance() {
        let border = ring(40, 40, 160, 160, 1);
        let sel = select_quadrilateral(vec![contour(border)], 200, 200, &QuadParams::default());
        let quad = sel.quad.expect("accepted");
        assert!(sel.confidence > 0.6 && sel.confidence <= 1.0, "{}", sel.confidence);
        assert!((quad.area() - 120.0 * 120.0).abs() < 50.0);
        assert_eq!(sel.candidates, 1);
    }

    #[test]
    fn tiny_candidates_are_rejected_with_zero_confidence() {
        let border = ring(10, 10, 30, 30, 1);
        let sel = select_quadrilateral(vec![contour(border)], 200, 200, &QuadParams::default());
        assert_eq!(sel.quad, None);
        assert_eq!(sel.confidence, 0.0);
        assert_eq!(sel.candidates, 0);
    }

    #[test]
    fn below_acceptance_keeps_confidence() {
        let border = ring(40, 40, 160, 160, 1);
        let params = QuadParams {
            acceptance_score: 0.95,
            ..QuadParams::default()
        };
        let sel = select_quadrilateral(vec![contour(border)], 200, 200, &params);
        assert!(sel.quad.is_none());
        assert!(sel.confidence > 0.6);
    }

    #[test]
    fn ties_prefer_larger_area() {
        // area weight zero: both squares score 1.0 on convexity and aspect
        let params = QuadParams {
            area_weight: 0.0,
            refine_corners: false,
            ..QuadParams::default()
        };
        let small = contour(ring(20, 20, 80, 80, 0));
        let large = contour(ring(10, 10, 190, 190, 0));
        let sel = select_quadrilateral(vec![small, large], 200, 200, &params);
        let quad = sel.quad.expect("accepted");
        assert!((quad.area() - 180.0 * 180.0).abs() < 1e-2);
        assert_eq!(sel.candidates, 2);
    }

    #[test]
    fn aspect_hint_prefers_matching_shapes() {
        let a4 = Quadrilateral::new([p(0.0, 0.0), p(100.0, 0.0), p(100.0, 141.4), p(0.0, 141.4)]);
        let square = Quadrilateral::new([p(0.0, 0.0), p(100.0, 0.0), p(100.0, 100.0), p(0.0, 100.0)]);
        let hint = Some(1.414);
        assert!(aspect_score(&a4, hint) > 0.99);
        assert!(aspect_score(&square, hint) < 0.55);
        assert!((aspect_score(&square, None) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn selection_is_deterministic() {
        let make = || {
            vec![
                contour(ring(40, 40, 160, 150, 2)),
                contour(ring(30, 20, 170, 180, 3)),
            ]
        };
        let a = select_quadrilateral(make(), 200, 200, &QuadParams::default());
        let b = select_quadrilateral(make(), 200, 200, &QuadParams::default());
        assert_eq!(a, b);
    }
}
