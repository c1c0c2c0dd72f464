//! Grayscale conversion, smoothing, and Canny edge extraction.
//!
//! The edge map is a GRAY8 image holding `255` on edge pixels and `0`
//! elsewhere. Smoothing, Canny, and the optional gap-closing pass come from
//! `imageproc`; this module only adapts frame layouts and picks the
//! detection resolution.

use crate::PreprocessParams;
use docscan_core::{ImageBuffer, ImageError, PixelFormat};
use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::close;

pub(crate) const EDGE: u8 = 255;

/// BT.601 luminance with 8-bit integer weights (77, 150, 29).
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32 + 128) >> 8) as u8
}

fn dimension(width: usize, height: usize) -> Result<(u32, u32), ImageError> {
    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(ImageError::Overflow { width, height }),
    }
}

/// Convert any supported frame to a packed `image::GrayImage`.
///
/// GRAY8 input is copied row by row (dropping stride padding); RGBA8 is
/// reduced with [`luma`], alpha is ignored.
pub fn to_gray(frame: &ImageBuffer) -> Result<GrayImage, ImageError> {
    frame.validate()?;
    let (w, h) = dimension(frame.width, frame.height)?;
    let mut data = Vec::with_capacity(frame.width * frame.height);

    for y in 0..frame.height {
        let row = frame.row(y);
        match frame.format {
            PixelFormat::Gray8 => data.extend_from_slice(row),
            PixelFormat::Rgba8 => {
                data.extend(row.chunks_exact(4).map(|px| luma(px[0], px[1], px[2])));
            }
        }
    }
    GrayImage::from_raw(w, h, data).ok_or(ImageError::Overflow {
        width: frame.width,
        height: frame.height,
    })
}

/// Integer factor that brings the longer side down to `max_dim` or below.
pub fn detection_factor(width: usize, height: usize, max_dim: Option<usize>) -> usize {
    match max_dim {
        Some(limit) if limit > 0 && width.max(height) > limit => width.max(height).div_ceil(limit),
        _ => 1,
    }
}

/// Box-average `factor x factor` blocks. Pixel `i` of the result covers
/// `[i * factor, (i + 1) * factor)` of the input, so coordinates scale back
/// by a plain multiplication.
pub fn downsample(gray: &GrayImage, factor: usize) -> GrayImage {
    if factor <= 1 {
        return gray.clone();
    }
    let f = factor as u32;
    let (src_w, src_h) = gray.dimensions();
    let w = (src_w / f).max(1);
    let h = (src_h / f).max(1);

    GrayImage::from_fn(w, h, |x, y| {
        let (x0, y0) = (x * f, y * f);
        let (x1, y1) = ((x0 + f).min(src_w), (y0 + f).min(src_h));
        let mut sum = 0u32;
        for yy in y0..y1 {
            for xx in x0..x1 {
                sum += gray.get_pixel(xx, yy).0[0] as u32;
            }
        }
        let count = (y1 - y0) * (x1 - x0);
        image::Luma([((sum + count / 2) / count) as u8])
    })
}

/// Binary edge map of a grayscale image.
///
/// `blur_sigma` adds smoothing on top of the fixed sigma Canny applies
/// internally; `0` skips it.
pub fn edge_map(gray: &GrayImage, params: &PreprocessParams) -> GrayImage {
    let edges = if params.blur_sigma > 0.0 {
        canny(
            &gaussian_blur_f32(gray, params.blur_sigma),
            params.low_threshold,
            params.high_threshold,
        )
    } else {
        canny(gray, params.low_threshold, params.high_threshold)
    };
    if params.close_gaps {
        close(&edges, Norm::LInf, 1)
    } else {
        edges
    }
}

fn into_buffer(gray: GrayImage) -> Result<ImageBuffer, ImageError> {
    let (w, h) = gray.dimensions();
    ImageBuffer::packed(w as usize, h as usize, PixelFormat::Gray8, gray.into_raw())
}

/// Full-resolution edge map of `frame` as a GRAY8 buffer.
///
/// Fails with [`ImageError`] when the buffer is malformed.
pub fn preprocess(frame: &ImageBuffer, params: &PreprocessParams) -> Result<ImageBuffer, ImageError> {
    let gray = to_gray(frame)?;
    into_buffer(edge_map(&gray, params))
}

/// Edge map for detection, downsampled per `max_detection_dimension`.
///
/// Returns the edge map and the integer factor that maps its coordinates
/// back onto `frame`.
pub fn preprocess_for_detection(
    frame: &ImageBuffer,
    params: &PreprocessParams,
) -> Result<(GrayImage, usize), ImageError> {
    let gray = to_gray(frame)?;
    let factor = detection_factor(frame.width, frame.height, params.max_detection_dimension);
    if factor > 1 {
        log::debug!(
            "downsampling {}x{} by {} for detection",
            frame.width,
            frame.height,
            factor
        );
        return Ok((edge_map(&downsample(&gray, factor), params), factor));
    }
    Ok((edge_map(&gray, params), factor))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertical_step(w: u32, h: u32, at: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, _| image::Luma([if x >= at { 255 } else { 0 }]))
    }

    fn edge_columns(edges: &GrayImage, y: u32) -> Vec<u32> {
        (0..edges.width())
            .filter(|&x| edges.get_pixel(x, y).0[0] == EDGE)
            .collect()
    }

    #[test]
    fn luma_weights_sum_to_full_scale() {
        assert_eq!(luma(255, 255, 255), 255);
        assert_eq!(luma(0, 0, 0), 0);
        assert_eq!(luma(255, 0, 0), 77);
    }

    #[test]
    fn rgba_converts_with_stride_padding() {
        // 2x2 RGBA with 4 bytes of padding per row
        let mut data = vec![0u8; 12 * 2];
        data[0..4].copy_from_slice(&[255, 255, 255, 0]);
        data[12 + 4..12 + 8].copy_from_slice(&[255, 0, 0, 255]);
        let img = ImageBuffer::new(2, 2, PixelFormat::Rgba8, 12, data).expect("valid");
        let gray = to_gray(&img).expect("gray");
        assert_eq!(gray.into_raw(), vec![255, 0, 0, 77]);
    }

    #[test]
    fn gray_passes_through() {
        let img = ImageBuffer::new(3, 2, PixelFormat::Gray8, 4, vec![1, 2, 3, 9, 4, 5, 6])
            .expect("valid");
        let gray = to_gray(&img).expect("gray");
        assert_eq!(gray.dimensions(), (3, 2));
        assert_eq!(gray.into_raw(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn malformed_input_is_rejected() {
        let img = ImageBuffer {
            width: 4,
            height: 0,
            format: PixelFormat::Gray8,
            stride: 4,
            data: Vec::new(),
        };
        let err = preprocess(&img, &PreprocessParams::default()).unwrap_err();
        assert!(matches!(err, ImageError::ZeroDimension { .. }));
    }

    #[test]
    fn step_edge_straddles_the_transition() {
        let gray = vertical_step(40, 20, 20);
        let params = PreprocessParams {
            close_gaps: false,
            ..PreprocessParams::default()
        };
        let edges = edge_map(&gray, &params);
        let cols = edge_columns(&edges, 10);
        assert!(!cols.is_empty() && cols.len() <= 2, "{cols:?}");
        assert!(cols.iter().all(|c| (19..=20).contains(c)), "{cols:?}");
    }

    #[test]
    fn closing_keeps_straight_edges_in_place() {
        let gray = vertical_step(40, 20, 20);
        let open = PreprocessParams {
            close_gaps: false,
            ..PreprocessParams::default()
        };
        let plain = edge_columns(&edge_map(&gray, &open), 10);
        let closed = edge_columns(&edge_map(&gray, &PreprocessParams::default()), 10);
        assert_eq!(plain, closed);
    }

    #[test]
    fn closing_fills_a_one_pixel_gap() {
        let mut edges = GrayImage::new(9, 5);
        for x in [1, 2, 3, 5, 6, 7] {
            edges.put_pixel(x, 2, image::Luma([EDGE]));
        }
        let closed = close(&edges, Norm::LInf, 1);
        assert_eq!(closed.get_pixel(4, 2).0[0], EDGE);
        assert_eq!(closed.get_pixel(4, 1).0[0], 0);
        assert_eq!(closed.get_pixel(4, 3).0[0], 0);
    }

    #[test]
    fn flat_image_has_no_edges() {
        let gray = GrayImage::new(32, 32);
        let edges = edge_map(&gray, &PreprocessParams::default());
        assert!(edges.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn weak_edges_need_a_strong_seed() {
        let gray = GrayImage::from_fn(40, 20, |x, _| image::Luma([if x >= 20 { 30 } else { 0 }]));
        let params = PreprocessParams {
            blur_sigma: 0.0,
            low_threshold: 5.0,
            high_threshold: 400.0,
            close_gaps: false,
            max_detection_dimension: None,
        };
        let edges = edge_map(&gray, &params);
        assert!(edges.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn downsample_averages_blocks() {
        let gray = GrayImage::from_raw(4, 2, vec![0, 100, 200, 200, 100, 0, 200, 200]).expect("raw");
        let small = downsample(&gray, 2);
        assert_eq!(small.dimensions(), (2, 1));
        assert_eq!(small.into_raw(), vec![50, 200]);
        assert_eq!(detection_factor(4000, 3000, Some(1024)), 4);
        assert_eq!(detection_factor(800, 600, Some(1024)), 1);
        assert_eq!(detection_factor(800, 600, None), 1);
    }

    #[test]
    fn detection_map_reports_its_factor() {
        let frame = ImageBuffer::packed(300, 100, PixelFormat::Gray8, vec![0; 300 * 100]).expect("frame");
        let params = PreprocessParams {
            max_detection_dimension: Some(100),
            ..PreprocessParams::default()
        };
        let (edges, factor) = preprocess_for_detection(&frame, &params).expect("edges");
        assert_eq!(factor, 3);
        assert_eq!(edges.dimensions(), (100, 33));
    }
}
