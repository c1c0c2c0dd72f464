use crate::ConfigError;
use serde::{Deserialize, Serialize};

/// Largest rectified output accepted, in pixels (64 MP, 256 MiB as RGBA8).
pub const MAX_OUTPUT_PIXELS: usize = 1 << 26;

/// Opaque RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const WHITE: Rgb = Rgb([255, 255, 255]);
    pub const BLACK: Rgb = Rgb([0, 0, 0]);

    /// Luminance with the same integer weights used for RGBA -> GRAY8.
    #[inline]
    pub fn luma(self) -> u8 {
        crate::preprocess::luma(self.0[0], self.0[1], self.0[2])
    }
}

/// Grayscale, smoothing, and edge-map parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessParams {
    /// Extra Gaussian sigma in pixels applied before Canny, which always
    /// smooths with its own fixed sigma of 1.4; `0.0` skips the extra pass.
    pub blur_sigma: f32,
    /// Hysteresis low threshold on the gradient magnitude.
    ///
    /// Magnitudes are raw 3x3 Sobel responses, about eight times the
    /// intensity change per pixel (0..~1440 for 8-bit input).
    pub low_threshold: f32,
    /// Hysteresis high threshold; edges must contain at least one pixel above it.
    pub high_threshold: f32,
    /// Run a 3x3 morphological closing on the edge map to bridge hairline gaps.
    pub close_gaps: bool,
    /// Frames whose longer side exceeds this are box-downsampled by an
    /// integer factor before edge detection. `None` keeps full resolution.
    pub max_detection_dimension: Option<usize>,
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self {
            blur_sigma: 1.0,
            low_threshold: 50.0,
            high_threshold: 150.0,
            close_gaps: true,
            max_detection_dimension: Some(1024),
        }
    }
}

/// Border-following and contour simplification parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourParams {
    /// Simplification tolerance as a fraction of the contour perimeter.
    pub simplify_ratio: f32,
    /// Contours shorter than this (pixels) are dropped.
    pub min_perimeter: f32,
}

impl Default for ContourParams {
    fn default() -> Self {
        Self {
            simplify_ratio: 0.005,
            min_perimeter: 40.0,
        }
    }
}

/// Quadrilateral approximation and scoring parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadParams {
    /// Candidates enclosing less than this fraction of the image are rejected.
    pub min_area_fraction: f32,
    /// Minimal score in `[0, 1]` for a candidate to count as a document.
    pub acceptance_score: f32,
    /// Iteration cap for the tolerance search that reduces a contour to 4 vertices.
    pub max_approx_iterations: usize,
    /// First approximation tolerance as a fraction of the contour perimeter.
    pub initial_epsilon_ratio: f32,
    /// Expected long/short side ratio (e.g. `1.414` for ISO 216 paper).
    pub aspect_ratio_hint: Option<f32>,
    pub area_weight: f32,
    pub convexity_weight: f32,
    pub aspect_weight: f32,
    /// Re-fit each side to the contour and intersect neighbouring sides.
    pub refine_corners: bool,
}

impl Default for QuadParams {
    fn default() -> Self {
        Self {
            min_area_fraction: 0.05,
            acceptance_score: 0.5,
            max_approx_iterations: 32,
            initial_epsilon_ratio: 0.02,
            aspect_ratio_hint: None,
            area_weight: 0.5,
            convexity_weight: 0.3,
            aspect_weight: 0.2,
            refine_corners: true,
        }
    }
}

/// Output geometry and fill color for the perspective-corrected crop.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifyParams {
    /// Fixed `(width, height)` of the output; derived from the quad when `None`.
    pub output_size: Option<(usize, usize)>,
    /// Fill for output pixels that map outside the source image.
    pub border_color: Rgb,
}

impl Default for RectifyParams {
    fn default() -> Self {
        Self {
            output_size: None,
            border_color: Rgb::WHITE,
        }
    }
}

/// Full scanner configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub preprocess: PreprocessParams,
    pub contours: ContourParams,
    pub quad: QuadParams,
    pub rectify: RectifyParams,
    /// Skip rectification and return only the corners when `false`.
    pub produce_rectified: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            preprocess: PreprocessParams::default(),
            contours: ContourParams::default(),
            quad: QuadParams::default(),
            rectify: RectifyParams::default(),
            produce_rectified: true,
        }
    }
}

/// `true` when a `width x height` output is non-empty and within
/// [`MAX_OUTPUT_PIXELS`].
pub fn output_size_allowed(width: usize, height: usize) -> bool {
    width > 0
        && height > 0
        && width
            .checked_mul(height)
            .is_some_and(|pixels| pixels <= MAX_OUTPUT_PIXELS)
}

impl ScanConfig {
    /// Reject contradictory or out-of-range settings before any work is done.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.preprocess;
        if !p.blur_sigma.is_finite() || p.blur_sigma < 0.0 {
            return Err(ConfigError::BlurSigma(p.blur_sigma));
        }
        if !p.low_threshold.is_finite()
            || !p.high_threshold.is_finite()
            || p.low_threshold < 0.0
            || p.low_threshold > p.high_threshold
        {
            return Err(ConfigError::Thresholds {
                low: p.low_threshold,
                high: p.high_threshold,
            });
        }
        if let Some(dim) = p.max_detection_dimension {
            if dim < 16 {
                return Err(ConfigError::DetectionDimension(dim));
            }
        }

        let c = &self.contours;
        if !(c.simplify_ratio.is_finite() && (0.0..1.0).contains(&c.simplify_ratio)) {
            return Err(ConfigError::Fraction {
                name: "simplify_ratio",
                value: c.simplify_ratio,
            });
        }
        if !c.min_perimeter.is_finite() || c.min_perimeter < 0.0 {
            return Err(ConfigError::MinPerimeter(c.min_perimeter));
        }

        let q = &self.quad;
        for (name, value) in [
            ("min_area_fraction", q.min_area_fraction),
            ("acceptance_score", q.acceptance_score),
            ("initial_epsilon_ratio", q.initial_epsilon_ratio),
        ] {
            if !(value.is_finite() && (0.0..=1.0).contains(&value)) {
                return Err(ConfigError::Fraction { name, value });
            }
        }
        if q.min_area_fraction >= 1.0 {
            return Err(ConfigError::Fraction {
                name: "min_area_fraction",
                value: q.min_area_fraction,
            });
        }
        if q.max_approx_iterations == 0 {
            return Err(ConfigError::ApproxIterations);
        }
        if let Some(hint) = q.aspect_ratio_hint {
            if !hint.is_finite() || hint <= 0.0 {
                return Err(ConfigError::AspectHint(hint));
            }
        }
        let weights = [q.area_weight, q.convexity_weight, q.aspect_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || weights.iter().sum::<f32>() <= 0.0
        {
            return Err(ConfigError::Weights);
        }

        if let Some((w, h)) = self.rectify.output_size {
            if !output_size_allowed(w, h) {
                return Err(ConfigError::OutputSize {
                    width: i64::try_from(w).unwrap_or(i64::MAX),
                    height: i64::try_from(h).unwrap_or(i64::MAX),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        ScanConfig::default().validate().expect("defaults");
        assert!(ScanConfig::default().produce_rectified);
    }

    #[test]
    fn zero_output_size_is_rejected() {
        let mut cfg = ScanConfig::default();
        cfg.rectify.output_size = Some((0, 10));
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OutputSize {
                width: 0,
                height: 10
            })
        ));
    }

    #[test]
    fn oversized_output_is_rejected() {
        let mut cfg = ScanConfig::default();
        cfg.rectify.output_size = Some((1 << 33, 1 << 33));
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OutputSize { .. })
        ));

        cfg.rectify.output_size = Some((usize::MAX, 2));
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OutputSize { .. })
        ));

        cfg.rectify.output_size = Some((MAX_OUTPUT_PIXELS / 4096 + 1, 4096));
        assert!(cfg.validate().is_err());
        cfg.rectify.output_size = Some((MAX_OUTPUT_PIXELS / 4096, 4096));
        cfg.validate().expect("exactly at the cap");
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let mut cfg = ScanConfig::default();
        cfg.preprocess.low_threshold = 50.0;
        cfg.preprocess.high_threshold = 10.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Thresholds { .. })));
    }

    #[test]
    fn all_zero_weights_are_rejected() {
        let mut cfg = ScanConfig::default();
        cfg.quad.area_weight = 0.0;
        cfg.quad.convexity_weight = 0.0;
        cfg.quad.aspect_weight = 0.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Weights)));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: ScanConfig = serde_json::from_str(
            r#"{ "quad": { "min_area_fraction": 0.2 } }"#,
        )
        .expect("parse");
        assert_eq!(cfg.quad.min_area_fraction, 0.2);
        assert_eq!(cfg.quad.acceptance_score, 0.5);
        assert_eq!(cfg.preprocess.blur_sigma, 1.0);
        assert_eq!(cfg.rectify.border_color, Rgb::WHITE);
        assert!(cfg.produce_rectified);
    }
}
