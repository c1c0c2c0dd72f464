//! Polygon helpers shared by the detection stages.
//!
//! All functions treat a slice of points as a *closed* polygon: the last
//! point connects back to the first.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Z component of `(b - a) x (c - b)`; positive for a clockwise turn on a
/// y-down raster.
#[inline]
pub fn turn(a: Point2<f32>, b: Point2<f32>, c: Point2<f32>) -> f32 {
    let (ux, uy) = (b.x - a.x, b.y - a.y);
    let (vx, vy) = (c.x - b.x, c.y - b.y);
    ux * vy - uy * vx
}

/// Shoelace area; positive when the polygon runs clockwise on a y-down raster.
pub fn signed_area(poly: &[Point2<f32>]) -> f32 {
    if poly.len() < 3 {
        return 0.0;
    }
    let mut acc = 0.0f64;
    for (i, p) in poly.iter().enumerate() {
        let q = poly[(i + 1) % poly.len()];
        acc += p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64;
    }
    (0.5 * acc) as f32
}

#[inline]
pub fn area(poly: &[Point2<f32>]) -> f32 {
    signed_area(poly).abs()
}

pub fn perimeter(poly: &[Point2<f32>]) -> f32 {
    if poly.len() < 2 {
        return 0.0;
    }
    poly.iter()
        .enumerate()
        .map(|(i, p)| (poly[(i + 1) % poly.len()] - *p).norm())
        .sum()
}

/// True when every turn has the same non-zero sign.
pub fn is_strictly_convex(poly: &[Point2<f32>]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0.0f32;
    for i in 0..n {
        let t = turn(poly[i], poly[(i + 1) % n], poly[(i + 2) % n]);
        if t == 0.0 || !t.is_finite() {
            return false;
        }
        if sign == 0.0 {
            sign = t.signum();
        } else if t.signum() != sign {
            return false;
        }
    }
    true
}

/// Four corners of a document boundary in pixel coordinates.
///
/// Once ordered the corners are top-left, top-right, bottom-right,
/// bottom-left, i.e. clockwise on screen.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quadrilateral {
    pub corners: [Point2<f32>; 4],
}

impl Quadrilateral {
    pub fn new(corners: [Point2<f32>; 4]) -> Self {
        Self { corners }
    }

    #[inline]
    pub fn top_left(&self) -> Point2<f32> {
        self.corners[0]
    }

    #[inline]
    pub fn top_right(&self) -> Point2<f32> {
        self.corners[1]
    }

    #[inline]
    pub fn bottom_right(&self) -> Point2<f32> {
        self.corners[2]
    }

    #[inline]
    pub fn bottom_left(&self) -> Point2<f32> {
        self.corners[3]
    }

    pub fn signed_area(&self) -> f32 {
        signed_area(&self.corners)
    }

    pub fn area(&self) -> f32 {
        area(&self.corners)
    }

    pub fn perimeter(&self) -> f32 {
        perimeter(&self.corners)
    }

    /// Mean of the four corners.
    pub fn centroid(&self) -> Point2<f32> {
        let (sx, sy) = self
            .corners
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point2::new(sx * 0.25, sy * 0.25)
    }

    pub fn is_convex(&self) -> bool {
        is_strictly_convex(&self.corners)
    }

    /// Lengths of sides `0-1, 1-2, 2-3, 3-0`.
    pub fn side_lengths(&self) -> [f32; 4] {
        let c = &self.corners;
        [
            (c[1] - c[0]).norm(),
            (c[2] - c[1]).norm(),
            (c[3] - c[2]).norm(),
            (c[0] - c[3]).norm(),
        ]
    }

    /// Uniformly scale every corner about the origin.
    pub fn scaled(&self, s: f32) -> Self {
        Self::new(self.corners.map(|p| Point2::new(p.x * s, p.y * s)))
    }
}
