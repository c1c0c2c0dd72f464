use serde::{Deserialize, Serialize};

/// Pixel layout of an [`ImageBuffer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// One luminance byte per pixel.
    Gray8,
    /// Four bytes per pixel, `R, G, B, A` order.
    Rgba8,
}

impl PixelFormat {
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// Reasons an [`ImageBuffer`] is rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("image has a zero dimension (width={width}, height={height})")]
    ZeroDimension { width: usize, height: usize },

    #[error("stride {stride} is smaller than one packed row ({min} bytes)")]
    StrideTooSmall { stride: usize, min: usize },

    #[error("pixel buffer too small (expected at least {expected} bytes, got {got})")]
    BufferTooSmall { expected: usize, got: usize },

    #[error("image dimensions overflow addressable memory (width={width}, height={height})")]
    Overflow { width: usize, height: usize },
}

/// Decoded frame handed to the scanner.
///
/// Rows start every `stride` bytes; only the first `width * bytes_per_pixel`
/// bytes of a row carry pixels. Stages never mutate a buffer they receive,
/// they allocate a new one instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageBuffer {
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    pub stride: usize,
    pub data: Vec<u8>,
}

impl ImageBuffer {
    /// Build and validate a buffer with an explicit row stride.
    pub fn new(
        width: usize,
        height: usize,
        format: PixelFormat,
        stride: usize,
        data: Vec<u8>,
    ) -> Result<Self, ImageError> {
        let img = Self {
            width,
            height,
            format,
            stride,
            data,
        };
        img.validate()?;
        Ok(img)
    }

    /// Build and validate a buffer whose rows are tightly packed.
    pub fn packed(
        width: usize,
        height: usize,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, ImageError> {
        let stride = width
            .checked_mul(format.bytes_per_pixel())
            .ok_or(ImageError::Overflow { width, height })?;
        Self::new(width, height, format, stride, data)
    }

    /// Bytes carrying pixel data in one row.
    #[inline]
    pub fn row_bytes(&self) -> usize {
        self.width * self.format.bytes_per_pixel()
    }

    /// Check dimensions, stride, and buffer length against each other.
    pub fn validate(&self) -> Result<(), ImageError> {
        let (width, height) = (self.width, self.height);
        if width == 0 || height == 0 {
            return Err(ImageError::ZeroDimension { width, height });
        }
        let min = width
            .checked_mul(self.format.bytes_per_pixel())
            .ok_or(ImageError::Overflow { width, height })?;
        if self.stride < min {
            return Err(ImageError::StrideTooSmall {
                stride: self.stride,
                min,
            });
        }
        // The last row does not need trailing padding.
        let expected = self
            .stride
            .checked_mul(height - 1)
            .and_then(|v| v.checked_add(min))
            .ok_or(ImageError::Overflow { width, height })?;
        if self.data.len() < expected {
            return Err(ImageError::BufferTooSmall {
                expected,
                got: self.data.len(),
            });
        }
        Ok(())
    }

    /// Pixel bytes of row `y`. Panics if `y` is out of range.
    #[inline]
    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.stride;
        &self.data[start..start + self.row_bytes()]
    }

    /// Channel bytes of the pixel at `(x, y)`. Panics if out of range.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let start = y * self.stride + x * bpp;
        &self.data[start..start + bpp]
    }
}

impl From<GrayImage> for ImageBuffer {
    fn from(img: GrayImage) -> Self {
        Self {
            width: img.width,
            height: img.height,
            format: PixelFormat::Gray8,
            stride: img.width,
            data: img.data,
        }
    }
}

/// Tightly packed single-channel working image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width * height],
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }
}

/// Bilinear sample of every channel at pixel-index coordinates `(x, y)`.
///
/// Neighbours outside the image are clamped to the nearest edge pixel, so
/// sampling right at the border never bleeds in a foreign color. `out` must
/// hold `bytes_per_pixel` bytes.
pub fn sample_bilinear_clamped(src: &ImageBuffer, x: f32, y: f32, out: &mut [u8]) {
    let max_x = src.width as i32 - 1;
    let max_y = src.height as i32 - 1;
    let xf = x.floor();
    let yf = y.floor();
    let fx = x - xf;
    let fy = y - yf;
    let x0 = (xf as i32).clamp(0, max_x) as usize;
    let y0 = (yf as i32).clamp(0, max_y) as usize;
    let x1 = (xf as i32 + 1).clamp(0, max_x) as usize;
    let y1 = (yf as i32 + 1).clamp(0, max_y) as usize;

    let p00 = src.pixel(x0, y0);
    let p10 = src.pixel(x1, y0);
    let p01 = src.pixel(x0, y1);
    let p11 = src.pixel(x1, y1);

    for (c, o) in out.iter_mut().enumerate() {
        let a = p00[c] as f32 + fx * (p10[c] as f32 - p00[c] as f32);
        let b = p01[c] as f32 + fx * (p11[c] as f32 - p01[c] as f32);
        *o = (a + fy * (b - a)).round().clamp(0.0, 255.0) as u8;
    }
}
