use docscan_core::{ImageBuffer, Quadrilateral};

/// Output of one scan.
///
/// `quadrilateral` is absent when no document was found; `confidence` is
/// then the best rejected candidate's score (or `0.0`).
#[derive(Clone, Debug, PartialEq)]
pub struct ScanResult {
    /// Document corners in source pixels, ordered TL, TR, BR, BL.
    pub quadrilateral: Option<Quadrilateral>,
    /// Perspective-corrected crop, same pixel format as the input.
    pub rectified: Option<ImageBuffer>,
    pub confidence: f32,
}

impl ScanResult {
    pub fn no_document(confidence: f32) -> Self {
        Self {
            quadrilateral: None,
            rectified: None,
            confidence,
        }
    }

    #[inline]
    pub fn is_document_found(&self) -> bool {
        self.quadrilateral.is_some()
    }
}
