//! Core types and utilities for document scanning.
//!
//! This crate is intentionally small and purely geometric: image buffers,
//! bilinear sampling, polygon helpers, and homographies. It knows nothing
//! about edge detection or document heuristics.
//!
//! Coordinates are continuous pixel coordinates with the origin at the
//! top-left corner of the image and y pointing down; the center of pixel
//! `(i, j)` sits at `(i + 0.5, j + 0.5)`. The bilinear sampler takes
//! pixel-index coordinates (pixel `i` at `i`), callers subtract `0.5`.

mod geometry;
mod homography;
mod image;
mod logger;

pub use geometry::{area, is_strictly_convex, perimeter, signed_area, turn, Quadrilateral};
pub use homography::{homography_from_4pt, Homography};
pub use image::{sample_bilinear_clamped, GrayImage, ImageBuffer, ImageError, PixelFormat};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{dropped_records, init_with_level};

pub use nalgebra::Point2;
