//! Document boundary detection and perspective correction.
//!
//! Stages, in pipeline order:
//! - [`preprocess()`]: grayscale, optional extra Gaussian blur, and
//!   `imageproc` Canny plus morphological closing into a binary edge map,
//! - [`ContourExtractor`]: `imageproc` border following plus closed-polyline
//!   simplification,
//! - [`select_quadrilateral`]: bounded 4-vertex approximation, scoring,
//!   best-candidate selection,
//! - [`order_corners`]: TL, TR, BR, BL order,
//! - [`rectify()`]: homography and bilinear resampling into an upright crop.
//!
//! [`ScanPipeline`] strings them together. Only malformed images and invalid
//! configuration are errors; everything else is a [`ScanResult`], possibly
//! without a document.
//!
//! ```
//! use docscan_core::{GrayImage, ImageBuffer};
//! use docscan_detect::{ScanConfig, ScanPipeline};
//!
//! let mut frame = GrayImage::new(200, 200);
//! for y in 40..160 {
//!     for x in 40..160 {
//!         frame.data[y * 200 + x] = 255;
//!     }
//! }
//! let pipeline = ScanPipeline::new(ScanConfig::default()).unwrap();
//! let result = pipeline.scan(&ImageBuffer::from(frame)).unwrap();
//! assert!(result.is_document_found());
//! ```

mod contour;
mod corners;
mod error;
mod params;
mod pipeline;
mod preprocess;
mod quad;
mod rectify;
mod result;
mod simplify;

pub use contour::{extract_contours, Contour, ContourExtractor, Contours};
pub use corners::{order_corners, OrderError};
pub use error::{ConfigError, ScanError};
pub use params::{
    output_size_allowed, ContourParams, PreprocessParams, QuadParams, RectifyParams, Rgb,
    ScanConfig, MAX_OUTPUT_PIXELS,
};
pub use pipeline::{scan, ScanPipeline, ScanStage};
pub use preprocess::{
    detection_factor, downsample, edge_map, luma, preprocess, preprocess_for_detection, to_gray,
};
pub use quad::{approximate_quad, refine_corners, score_candidate, select_quadrilateral, QuadSelection};
pub use rectify::{output_size, rectify, rectifying_homography, RectifyError};
pub use result::ScanResult;
pub use simplify::simplify_closed;
