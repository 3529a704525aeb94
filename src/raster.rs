//! Raster images handed to the uploader.
//!
//! Pixel bytes are kept in a `bytes::Bytes` so chunking can slice them
//! without copying.

use std::path::Path;

use bytes::Bytes;
use image::DynamicImage;

use crate::error::Result;

/// Raw raster: dimensions plus row-major pixel bytes.
///
/// Immutable once built. Cloning is cheap (the pixel buffer is shared).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    pixels: Bytes,
}

impl RasterImage {
    /// Create a raster from raw parts.
    ///
    /// The pixel layout is not checked against the dimensions; the bytes go
    /// out exactly as given.
    pub fn new(width: u32, height: u32, pixels: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            pixels: pixels.into(),
        }
    }

    /// Load an image file and flatten it to 8-bit greyscale.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let decoded = image::open(path)?;
        tracing::debug!(
            "Loaded {} ({}x{}, {:?})",
            path.display(),
            decoded.width(),
            decoded.height(),
            decoded.color()
        );
        Ok(Self::from_dynamic(decoded))
    }

    /// Convert a decoded image into a one-byte-per-pixel greyscale raster.
    ///
    /// This is lossy for anything but 8-bit greyscale input: colour
    /// channels are merged into luma, alpha is dropped and 16-bit samples
    /// are narrowed to 8 bits. The processor then receives
    /// `width * height` bytes rather than the source's stored channel
    /// samples. Use [`RasterImage::new`] to upload a buffer unchanged.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        let grey = image.into_luma8();
        let (width, height) = grey.dimensions();
        Self::new(width, height, grey.into_raw())
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Shared handle to the pixel buffer (cheap, zero-copy).
    #[inline]
    pub fn pixel_bytes(&self) -> Bytes {
        self.pixels.clone()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}
