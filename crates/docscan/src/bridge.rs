//! Call/response boundary for host applications (mobile shells, scripts).
//!
//! A host hands over encoded image bytes plus a small camelCase
//! configuration and gets back a flat response:
//!
//! ```json
//! {
//!   "error": false,
//!   "detected": true,
//!   "corners": [{"x": 0.2, "y": 0.2}, {"x": 0.8, "y": 0.2}, ...],
//!   "confidence": 0.68,
//!   "sourceWidth": 200,
//!   "sourceHeight": 200,
//!   "rectified": {"width": 120, "height": 120, "mimeType": "image/jpeg", "fileSize": 2051}
//! }
//! ```
//!
//! With `includeBase64` the rectified object also carries the JPEG as a
//! standard-alphabet base64 string under `base64`.
//!
//! Corners are ordered top-left, top-right, bottom-right, bottom-left and
//! normalized to `[0, 1]` by the source width and height (origin top-left,
//! y down). Multiply by `sourceWidth` / `sourceHeight` to get pixels.
//!
//! Invalid images and invalid configuration come back with `error: true`
//! and an `errorMessage`; a frame without a document is a successful
//! response with `detected: false`.

use crate::core::{ImageBuffer, ImageError, PixelFormat};
use crate::detect::{ConfigError, Rgb, ScanConfig, ScanError, ScanPipeline, ScanResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors that turn into an error response.
#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error("invalid configuration JSON: {0}")]
    ConfigJson(#[from] serde_json::Error),

    #[error(transparent)]
    Scan(ScanError),

    #[error("failed to encode rectified image: {0}")]
    Encode(#[source] image::ImageError),
}

impl From<ScanError> for BridgeError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::Configuration(e) => BridgeError::Configuration(e),
            other => BridgeError::Scan(other),
        }
    }
}

impl From<ImageError> for BridgeError {
    fn from(err: ImageError) -> Self {
        BridgeError::Scan(ScanError::InvalidImage(err))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorderColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl From<BorderColor> for Rgb {
    fn from(c: BorderColor) -> Self {
        Rgb([c.r, c.g, c.b])
    }
}

/// Host-facing configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Smallest document area as a fraction of the frame.
    pub min_area_fraction: f32,
    /// Minimal score for a candidate to be reported as a document.
    pub acceptance_score_threshold: f32,
    /// Fixed output size; both or neither must be set, and both positive.
    pub output_width: Option<i64>,
    pub output_height: Option<i64>,
    pub border_color: BorderColor,
    /// JPEG quality in `[0, 1]` for the rectified image.
    pub quality: f32,
    /// Embed the encoded rectified image in the response as base64.
    pub include_base64: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let scan = ScanConfig::default();
        let [r, g, b] = scan.rectify.border_color.0;
        Self {
            min_area_fraction: scan.quad.min_area_fraction,
            acceptance_score_threshold: scan.quad.acceptance_score,
            output_width: None,
            output_height: None,
            border_color: BorderColor { r, g, b },
            quality: 1.0,
            include_base64: false,
        }
    }
}

impl BridgeConfig {
    /// Map onto the full scanner configuration and validate it.
    pub fn to_scan_config(&self) -> Result<ScanConfig, ConfigError> {
        let mut cfg = ScanConfig::default();
        cfg.quad.min_area_fraction = self.min_area_fraction;
        cfg.quad.acceptance_score = self.acceptance_score_threshold;
        cfg.rectify.border_color = self.border_color.into();
        cfg.rectify.output_size = match (self.output_width, self.output_height) {
            (None, None) => None,
            (Some(w), Some(h)) => match (usize::try_from(w), usize::try_from(h)) {
                (Ok(uw), Ok(uh)) => Some((uw, uh)),
                _ => return Err(ConfigError::OutputSize { width: w, height: h }),
            },
            (w, h) => {
                return Err(ConfigError::OutputSize {
                    width: w.unwrap_or(0),
                    height: h.unwrap_or(0),
                })
            }
        };
        if !(self.quality.is_finite() && (0.0..=1.0).contains(&self.quality)) {
            return Err(ConfigError::Fraction {
                name: "quality",
                value: self.quality,
            });
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Corner in normalized image coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RectifiedImage {
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
    /// Size of the encoded JPEG in bytes.
    pub file_size: u64,
    /// The encoded JPEG, present only with `includeBase64`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
}

/// Flat response handed back to the host.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeResponse {
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub detected: bool,
    /// Empty, or four corners TL, TR, BR, BL.
    pub corners: Vec<NormalizedPoint>,
    pub confidence: f32,
    pub source_width: u32,
    pub source_height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rectified: Option<RectifiedImage>,
}

impl BridgeResponse {
    pub fn from_error(err: &BridgeError) -> Self {
        Self {
            error: true,
            error_message: Some(err.to_string()),
            ..Self::default()
        }
    }
}

/// Convert any decoded image into an RGBA8 [`ImageBuffer`].
pub fn image_buffer_from_dynamic(img: &DynamicImage) -> Result<ImageBuffer, ImageError> {
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    ImageBuffer::packed(w as usize, h as usize, PixelFormat::Rgba8, rgba.into_raw())
}

/// Wrap an `image::GrayImage` without changing its pixels.
pub fn image_buffer_from_gray(img: &image::GrayImage) -> Result<ImageBuffer, ImageError> {
    let (w, h) = img.dimensions();
    ImageBuffer::packed(w as usize, h as usize, PixelFormat::Gray8, img.as_raw().clone())
}

/// Decode PNG, JPEG, or any other format `image` was built with.
///
/// 8-bit grayscale stays GRAY8; everything else becomes RGBA8.
pub fn decode(bytes: &[u8]) -> Result<ImageBuffer, BridgeError> {
    let img = image::load_from_memory(bytes).map_err(BridgeError::Decode)?;
    let buffer = match &img {
        DynamicImage::ImageLuma8(gray) => image_buffer_from_gray(gray)?,
        other => image_buffer_from_dynamic(other)?,
    };
    Ok(buffer)
}

/// Encode as baseline JPEG; alpha is dropped. `quality` is in `[0, 1]`.
pub fn encode_jpeg(img: &ImageBuffer, quality: f32) -> Result<Vec<u8>, BridgeError> {
    img.validate()?;
    let q = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
    let (w, h) = (img.width as u32, img.height as u32);

    let (pixels, color) = match img.format {
        PixelFormat::Gray8 => {
            let mut px = Vec::with_capacity(img.width * img.height);
            for y in 0..img.height {
                px.extend_from_slice(img.row(y));
            }
            (px, ExtendedColorType::L8)
        }
        PixelFormat::Rgba8 => {
            let mut px = Vec::with_capacity(img.width * img.height * 3);
            for y in 0..img.height {
                for rgba in img.row(y).chunks_exact(4) {
                    px.extend_from_slice(&rgba[..3]);
                }
            }
            (px, ExtendedColorType::Rgb8)
        }
    };

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, q)
        .write_image(&pixels, w, h, color)
        .map_err(BridgeError::Encode)?;
    Ok(out)
}

fn build_response(
    image: &ImageBuffer,
    result: ScanResult,
    cfg: &BridgeConfig,
) -> Result<BridgeResponse, BridgeError> {
    let (sw, sh) = (image.width as f32, image.height as f32);
    let corners = result
        .quadrilateral
        .map(|q| {
            q.corners
                .iter()
                .map(|p| NormalizedPoint {
                    x: p.x / sw,
                    y: p.y / sh,
                })
                .collect()
        })
        .unwrap_or_default();

    let rectified = match &result.rectified {
        Some(img) => {
            let jpeg = encode_jpeg(img, cfg.quality)?;
            Some(RectifiedImage {
                width: img.width as u32,
                height: img.height as u32,
                mime_type: "image/jpeg".to_string(),
                file_size: jpeg.len() as u64,
                base64: cfg.include_base64.then(|| STANDARD.encode(&jpeg)),
            })
        }
        None => None,
    };

    Ok(BridgeResponse {
        error: false,
        error_message: None,
        detected: result.quadrilateral.is_some(),
        corners,
        confidence: result.confidence,
        source_width: image.width as u32,
        source_height: image.height as u32,
        rectified,
    })
}

/// Scan an already decoded frame.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(image, cfg), fields(width = image.width, height = image.height))
)]
pub fn scan_buffer(image: &ImageBuffer, cfg: &BridgeConfig) -> Result<BridgeResponse, BridgeError> {
    let pipeline = ScanPipeline::new(cfg.to_scan_config()?)?;
    let result = pipeline.scan(image)?;
    build_response(image, result, cfg)
}

/// Decode `bytes` and scan them.
///
/// Configuration is checked before decoding, so a bad configuration is
/// reported even for undecodable input.
pub fn scan_encoded(bytes: &[u8], cfg: &BridgeConfig) -> Result<BridgeResponse, BridgeError> {
    let scan_cfg = cfg.to_scan_config()?;
    let image = decode(bytes)?;
    let result = ScanPipeline::new(scan_cfg)?.scan(&image)?;
    build_response(&image, result, cfg)
}

/// Like [`scan_encoded`] but never fails: errors become error responses.
pub fn handle_request(bytes: &[u8], cfg: &BridgeConfig) -> BridgeResponse {
    scan_encoded(bytes, cfg).unwrap_or_else(|err| {
        log::warn!("scan request failed: {err}");
        BridgeResponse::from_error(&err)
    })
}

/// JSON in, JSON out. An empty `config_json` means defaults.
pub fn handle_json(bytes: &[u8], config_json: &str) -> String {
    let response = if config_json.trim().is_empty() {
        handle_request(bytes, &BridgeConfig::default())
    } else {
        match serde_json::from_str::<BridgeConfig>(config_json) {
            Ok(cfg) => handle_request(bytes, &cfg),
            Err(err) => BridgeResponse::from_error(&BridgeError::ConfigJson(err)),
        }
    };
    serde_json::to_string(&response).unwrap_or_else(|err| {
        format!(
            r#"{{"error":true,"errorMessage":{}}}"#,
            serde_json::Value::String(err.to_string())
        )
    })
}
