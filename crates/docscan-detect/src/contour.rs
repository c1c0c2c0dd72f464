//! Contours of a binary edge map.
//!
//! Border following itself is `imageproc::contours::find_contours`
//! (Suzuki & Abe). [`ContourExtractor`] traces once and keeps the raw
//! borders; each call to [`ContourExtractor::iter`] walks them again in
//! discovery order, filtering and simplifying lazily, so the sequence is
//! finite and restartable.

use crate::simplify::simplify_closed;
use crate::ContourParams;
use docscan_core::{perimeter, ImageBuffer, ImageError};
use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;
use nalgebra::Point2;

/// Pixel `(x, y)` as its center in continuous coordinates.
#[inline]
pub(crate) fn pixel_center(p: &Point<i32>) -> Point2<f32> {
    Point2::new(p.x as f32 + 0.5, p.y as f32 + 0.5)
}

/// A traced and simplified closed border.
#[derive(Clone, Debug, PartialEq)]
pub struct Contour {
    /// Simplified outline at pixel centers (`index + 0.5`), closed implicitly.
    pub points: Vec<Point2<f32>>,
    /// Every traced border pixel, in tracing order.
    pub border: Vec<Point<i32>>,
    /// `true` for a border between an edge component and a hole inside it.
    pub is_hole: bool,
    /// Perimeter of the raw trace before simplification.
    pub perimeter: f32,
}

impl Contour {
    /// Raw border as pixel centers.
    pub fn border_centers(&self) -> Vec<Point2<f32>> {
        self.border.iter().map(pixel_center).collect()
    }
}

/// Reusable contour source over one edge map.
#[derive(Clone, Debug)]
pub struct ContourExtractor {
    width: usize,
    height: usize,
    traced: Vec<(Vec<Point<i32>>, bool)>,
    params: ContourParams,
}

impl ContourExtractor {
    /// Any non-zero byte of the first channel counts as an edge pixel.
    pub fn new(edges: &ImageBuffer, params: ContourParams) -> Result<Self, ImageError> {
        edges.validate()?;
        let overflow = ImageError::Overflow {
            width: edges.width,
            height: edges.height,
        };
        let (w, h) = match (u32::try_from(edges.width), u32::try_from(edges.height)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => return Err(overflow),
        };
        let bpp = edges.format.bytes_per_pixel();
        let mut data = Vec::with_capacity(edges.width * edges.height);
        for y in 0..edges.height {
            data.extend(edges.row(y).iter().step_by(bpp));
        }
        let gray = GrayImage::from_raw(w, h, data).ok_or(overflow)?;
        Ok(Self::from_edges(&gray, params))
    }

    /// Trace an edge map that is already an `image::GrayImage`.
    pub fn from_edges(edges: &GrayImage, params: ContourParams) -> Self {
        let traced = find_contours::<i32>(edges)
            .into_iter()
            .map(|c| (c.points, matches!(c.border_type, BorderType::Hole)))
            .collect::<Vec<_>>();
        log::trace!("traced {} borders", traced.len());
        Self {
            width: edges.width() as usize,
            height: edges.height() as usize,
            traced,
            params,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Start a new pass from the first discovered border.
    pub fn iter(&self) -> Contours<'_> {
        Contours {
            extractor: self,
            next: 0,
        }
    }

    fn finish(&self, border: &[Point<i32>], is_hole: bool) -> Option<Contour> {
        let params = &self.params;
        if border.len() < 4 {
            return None;
        }
        let centers: Vec<Point2<f32>> = border.iter().map(pixel_center).collect();
        let raw_perimeter = perimeter(&centers);
        if raw_perimeter < params.min_perimeter {
            return None;
        }
        let epsilon = f64::from(params.simplify_ratio * raw_perimeter);
        let points: Vec<Point2<f32>> = simplify_closed(border, epsilon)
            .iter()
            .map(pixel_center)
            .collect();
        if points.len() < 4 {
            return None;
        }
        Some(Contour {
            points,
            border: border.to_vec(),
            is_hole,
            perimeter: raw_perimeter,
        })
    }
}

impl<'a> IntoIterator for &'a ContourExtractor {
    type Item = Contour;
    type IntoIter = Contours<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy pass over the traced borders; see [`ContourExtractor::iter`].
pub struct Contours<'a> {
    extractor: &'a ContourExtractor,
    next: usize,
}

impl Iterator for Contours<'_> {
    type Item = Contour;

    fn next(&mut self) -> Option<Contour> {
        while let Some((border, is_hole)) = self.extractor.traced.get(self.next) {
            self.next += 1;
            if let Some(contour) = self.extractor.finish(border, *is_hole) {
                return Some(contour);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.extractor.traced.len() - self.next))
    }
}

/// Collect every contour of `edges` in discovery order.
pub fn extract_contours(
    edges: &ImageBuffer,
    params: &ContourParams,
) -> Result<Vec<Contour>, ImageError> {
    Ok(ContourExtractor::new(edges, params.clone())?.iter().collect())
}
