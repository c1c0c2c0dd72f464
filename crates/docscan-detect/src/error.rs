use docscan_core::ImageError;

/// Contradictory or out-of-range configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("blur sigma must be finite and >= 0 (got {0})")]
    BlurSigma(f32),
    #[error("edge thresholds must satisfy 0 <= low <= high (low={low}, high={high})")]
    Thresholds { low: f32, high: f32 },
    #[error("max detection dimension must be >= 16 (got {0})")]
    DetectionDimension(usize),
    #[error("{name} must be a fraction in [0, 1] (got {value})")]
    Fraction { name: &'static str, value: f32 },
    #[error("minimum contour perimeter must be finite and >= 0 (got {0})")]
    MinPerimeter(f32),
    #[error("polygon approximation needs at least one iteration")]
    ApproxIterations,
    #[error("aspect ratio hint must be finite and > 0 (got {0})")]
    AspectHint(f32),
    #[error("score weights must be non-negative with a positive sum")]
    Weights,
    #[error(
        "output size must be positive and at most {max} pixels (width={width}, height={height})",
        max = crate::MAX_OUTPUT_PIXELS
    )]
    OutputSize { width: i64, height: i64 },
}

/// Failures that cross the scan boundary. Geometric degeneracies never do;
/// they end up as a result without a quadrilateral.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error("invalid image: {0}")]
    InvalidImage(#[from] ImageError),
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),
}
