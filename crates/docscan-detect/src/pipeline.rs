use crate::contour::ContourExtractor;
use crate::corners::order_corners;
use crate::preprocess::preprocess_for_detection;
use crate::quad::select_quadrilateral;
use crate::rectify::rectify;
use crate::{ScanConfig, ScanError, ScanResult};
use docscan_core::{ImageBuffer, Quadrilateral};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Stages of one scan. `NoDocumentFound` and `Done` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanStage {
    Idle,
    Preprocessing,
    ContourExtraction,
    QuadSelection,
    NoDocumentFound,
    CornerOrdering,
    Rectifying,
    Done,
}

/// Per-call bookkeeping; dropped when the call returns.
struct Run {
    stage: ScanStage,
}

impl Run {
    fn new() -> Self {
        Self {
            stage: ScanStage::Idle,
        }
    }

    fn enter(&mut self, next: ScanStage) {
        log::debug!("scan: {:?} -> {:?}", self.stage, next);
        self.stage = next;
    }

    fn no_document(&mut self, confidence: f32) -> ScanResult {
        self.enter(ScanStage::NoDocumentFound);
        ScanResult::no_document(confidence)
    }
}

/// Document scanner: edge map, contours, quad selection, corner order,
/// rectification.
///
/// Holds only validated configuration; every [`ScanPipeline::scan`] call
/// starts from [`ScanStage::Idle`] and shares nothing with other calls, so
/// one pipeline can serve several threads.
#[derive(Clone, Debug)]
pub struct ScanPipeline {
    config: ScanConfig,
}

impl ScanPipeline {
    /// Validate `config` up front; an invalid one never reaches a scan.
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[inline]
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan one frame.
    ///
    /// Only a malformed `image` is an error. Missing or degenerate
    /// documents produce a [`ScanResult`] without a quadrilateral.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, image), fields(width = image.width, height = image.height))
    )]
    pub fn scan(&self, image: &ImageBuffer) -> Result<ScanResult, ScanError> {
        let cfg = &self.config;
        let mut run = Run::new();

        run.enter(ScanStage::Preprocessing);
        let (edges, factor) = preprocess_for_detection(image, &cfg.preprocess)?;

        run.enter(ScanStage::ContourExtraction);
        let extractor = ContourExtractor::from_edges(&edges, cfg.contours.clone());

        run.enter(ScanStage::QuadSelection);
        let selection = select_quadrilateral(
            extractor.iter(),
            extractor.width(),
            extractor.height(),
            &cfg.quad,
        );
        log::debug!(
            "{} candidate(s), best score {:.3}",
            selection.candidates,
            selection.confidence
        );
        let Some(quad) = selection.quad else {
            return Ok(run.no_document(selection.confidence));
        };
        let quad = if factor > 1 {
            quad.scaled(factor as f32)
        } else {
            quad
        };

        run.enter(ScanStage::CornerOrdering);
        let ordered = match order_corners(&quad) {
            Ok(q) => q,
            Err(err) => {
                log::warn!("discarding candidate: {err}");
                return Ok(run.no_document(selection.confidence));
            }
        };

        let rectified = if cfg.produce_rectified {
            run.enter(ScanStage::Rectifying);
            match rectify(image, &ordered, &cfg.rectify) {
                Ok(img) => Some(img),
                Err(err) => {
                    log::warn!("discarding candidate: {err}");
                    return Ok(run.no_document(selection.confidence));
                }
            }
        } else {
            None
        };

        run.enter(ScanStage::Done);
        Ok(ScanResult {
            quadrilateral: Some(ordered),
            rectified,
            confidence: selection.confidence,
        })
    }

    /// Rectify `image` with caller-supplied corners, skipping detection.
    ///
    /// Corners are put into TL, TR, BR, BL order first; degenerate corners
    /// give `Ok(None)`.
    pub fn rectify_with(
        &self,
        image: &ImageBuffer,
        quad: &Quadrilateral,
    ) -> Result<Option<ImageBuffer>, ScanError> {
        image.validate()?;
        let Ok(ordered) = order_corners(quad) else {
            return Ok(None);
        };
        Ok(rectify(image, &ordered, &self.config.rectify).ok())
    }
}

/// One-shot scan with a throwaway [`ScanPipeline`].
pub fn scan(image: &ImageBuffer, config: &ScanConfig) -> Result<ScanResult, ScanError> {
    ScanPipeline::new(config.clone())?.scan(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscan_core::{GrayImage, ImageError, PixelFormat};

    fn white_rect(w: usize, h: usize, x0: usize, y0: usize, x1: usize, y1: usize) -> ImageBuffer {
        let mut img = GrayImage::new(w, h);
        for y in y0..y1 {
            for x in x0..x1 {
                img.data[y * w + x] = 255;
            }
        }
        img.into()
    }

    #[test]
    fn invalid_config_fails_before_scanning() {
        let mut cfg = ScanConfig::default();
        cfg.rectify.output_size = Some((0, 0));
        assert!(matches!(
            ScanPipeline::new(cfg),
            Err(ScanError::Configuration(_))
        ));
    }

    #[test]
    fn malformed_image_is_fatal() {
        let pipeline = ScanPipeline::new(ScanConfig::default()).unwrap();
        let img = ImageBuffer {
            width: 10,
            height: 10,
            format: PixelFormat::Rgba8,
            stride: 40,
            data: vec![0; 100],
        };
        assert!(matches!(
            pipeline.scan(&img),
            Err(ScanError::InvalidImage(ImageError::BufferTooSmall { .. }))
        ));
    }

    #[test]
    fn blank_frame_has_no_document() {
        let res = scan(&GrayImage::new(64, 48).into(), &ScanConfig::default()).unwrap();
        assert!(!res.is_document_found());
        assert!(res.rectified.is_none());
        assert_eq!(res.confidence, 0.0);
    }

    #[test]
    fn corners_only_mode_skips_rectification() {
        let cfg = ScanConfig {
            produce_rectified: false,
            ..ScanConfig::default()
        };
        let res = scan(&white_rect(120, 100, 20, 20, 100, 80), &cfg).unwrap();
        assert!(res.is_document_found());
        assert!(res.rectified.is_none());
    }

    #[test]
    fn rectify_with_orders_corners() {
        let img = white_rect(50, 50, 0, 0, 50, 50);
        let pipeline = ScanPipeline::new(ScanConfig::default()).unwrap();
        let quad = Quadrilateral::new([
            nalgebra::Point2::new(40.0, 40.0),
            nalgebra::Point2::new(10.0, 10.0),
            nalgebra::Point2::new(10.0, 40.0),
            nalgebra::Point2::new(40.0, 10.0),
        ]);
        let out = pipeline.rectify_with(&img, &quad).unwrap().expect("rectified");
        assert_eq!((out.width, out.height), (30, 30));
        assert!(out.data.iter().all(|&v| v == 255));

        let flat = Quadrilateral::new([nalgebra::Point2::new(0.0, 0.0); 4]);
        assert_eq!(pipeline.rectify_with(&img, &flat).unwrap(), None);
    }
}
