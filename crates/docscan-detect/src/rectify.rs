//! Perspective correction of a document quadrilateral into an upright
//! rectangle.
//!
//! The output rectangle spans `[0, w] x [0, h]` with corners matched to
//! TL, TR, BR, BL. Each output pixel center is mapped back into the source
//! and sampled bilinearly; samples that land outside the source take the
//! border color.

use crate::corners::has_collinear_triple;
use crate::params::output_size_allowed;
use crate::RectifyParams;
use docscan_core::{
    homography_from_4pt, sample_bilinear_clamped, Homography, ImageBuffer, ImageError,
    PixelFormat, Quadrilateral,
};
use nalgebra::Point2;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RectifyError {
    #[error("quadrilateral corners do not define an invertible transform")]
    SingularTransform,
    #[error(
        "output size must be positive and at most {max} pixels (got {width}x{height})",
        max = crate::MAX_OUTPUT_PIXELS
    )]
    InvalidOutputSize { width: usize, height: usize },
    #[error(transparent)]
    InvalidImage(#[from] ImageError),
}

/// Slack for samples that land a hair outside the source after rounding.
const INSIDE_EPS: f32 = 1e-3;

/// Smallest accepted ratio between the homography's determinant and the
/// quad-to-output area ratio it should be close to.
const MIN_RELATIVE_DET: f64 = 1e-6;

/// Output size derived from the mean of opposite sides, at least `1x1`.
pub fn output_size(quad: &Quadrilateral) -> (usize, usize) {
    let [top, right, bottom, left] = quad.side_lengths();
    let w = (0.5 * (top + bottom)).round().max(1.0);
    let h = (0.5 * (left + right)).round().max(1.0);
    (w as usize, h as usize)
}

/// Homography taking output-rectangle coordinates to source coordinates.
///
/// With `H[2][2] == 1` the determinant is the local area scale at the
/// output origin, so it is judged against `quad area / (width * height)`
/// rather than in absolute units.
pub fn rectifying_homography(
    quad: &Quadrilateral,
    width: usize,
    height: usize,
) -> Result<Homography, RectifyError> {
    if has_collinear_triple(&quad.corners) {
        return Err(RectifyError::SingularTransform);
    }
    let (w, h) = (width as f32, height as f32);
    let rect = [
        Point2::new(0.0, 0.0),
        Point2::new(w, 0.0),
        Point2::new(w, h),
        Point2::new(0.0, h),
    ];
    let hmg = homography_from_4pt(&rect, &quad.corners).ok_or(RectifyError::SingularTransform)?;
    let expected = f64::from(quad.area()) / (width as f64 * height as f64);
    let det = hmg.normalized_determinant();
    let regular = det.is_finite() && expected.is_finite() && det.abs() > MIN_RELATIVE_DET * expected;
    if !regular {
        return Err(RectifyError::SingularTransform);
    }
    Ok(hmg)
}

/// Warp the region of `source` bounded by `quad` (ordered TL, TR, BR, BL)
/// into an upright image of the same pixel format.
pub fn rectify(
    source: &ImageBuffer,
    quad: &Quadrilateral,
    params: &RectifyParams,
) -> Result<ImageBuffer, RectifyError> {
    source.validate()?;
    let (width, height) = params.output_size.unwrap_or_else(|| output_size(quad));
    if !output_size_allowed(width, height) {
        return Err(RectifyError::InvalidOutputSize { width, height });
    }
    let hmg = rectifying_homography(quad, width, height)?;

    let bpp = source.format.bytes_per_pixel();
    let [r, g, b] = params.border_color.0;
    let fill: [u8; 4] = match source.format {
        PixelFormat::Gray8 => [params.border_color.luma(), 0, 0, 0],
        PixelFormat::Rgba8 => [r, g, b, 255],
    };
    let (src_w, src_h) = (source.width as f32, source.height as f32);

    let mut data = vec![0u8; width * height * bpp];
    for (v, row) in data.chunks_exact_mut(width * bpp).enumerate() {
        for (u, px) in row.chunks_exact_mut(bpp).enumerate() {
            let dst = Point2::new(u as f32 + 0.5, v as f32 + 0.5);
            match hmg.try_apply(dst) {
                Some(s)
                    if s.x >= -INSIDE_EPS
                        && s.y >= -INSIDE_EPS
                        && s.x <= src_w + INSIDE_EPS
                        && s.y <= src_h + INSIDE_EPS =>
                {
                    sample_bilinear_clamped(source, s.x - 0.5, s.y - 0.5, px);
                }
                _ => px.copy_from_slice(&fill[..bpp]),
            }
        }
    }

    Ok(ImageBuffer::packed(width, height, source.format, data)?)
}
