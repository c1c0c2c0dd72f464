//! High-level facade crate for the `docscan-*` workspace.
//!
//! This crate provides:
//! - re-exports of the core geometry crate and the detection pipeline,
//! - (feature-gated) a host bridge that decodes encoded images, scans them,
//!   and returns a flat, serializable response.
//!
//! ## Quickstart
//!
//! ```no_run
//! use docscan::bridge::{scan_encoded, BridgeConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("page.jpg")?;
//! let response = scan_encoded(&bytes, &BridgeConfig::default())?;
//! if response.detected {
//!     println!("corners: {:?}", response.corners);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `docscan::core`: image buffers, bilinear sampling, polygons, homographies.
//! - `docscan::detect`: preprocessing, contours, quad selection, corner
//!   order, rectification, and [`ScanPipeline`].
//! - `docscan::bridge` (feature `image`): encoded bytes in, normalized
//!   corners and an optional JPEG crop out.

pub use docscan_core as core;
pub use docscan_detect as detect;

pub use docscan_core::{ImageBuffer, ImageError, PixelFormat, Quadrilateral};
pub use docscan_detect::{scan, ScanConfig, ScanError, ScanPipeline, ScanResult};

#[cfg(feature = "image")]
pub mod bridge;
