//! Screenshot acquisition.
//!
//! | Item | Role |
//! |------|------|
//! | [`ScreenshotProvider`] | Full-viewport PNG on request |
//! | [`ScreenshotAcquirer`] | Crops the viewport to the slide's box |
//! | [`PageImage`] | One captured slide |
//! | [`SettleOnce`] | Single-settlement guard for timeout races |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use image::ImageReader;

use crate::error::{Error, Result};

// ============================================================================
// Submodules
// ============================================================================

/// Viewport capture and cropping.
pub mod acquirer;

/// Single-settlement guard.
pub mod settle;

// ============================================================================
// Re-exports
// ============================================================================

pub use acquirer::{CropRegion, ScreenshotAcquirer, crop_region};
pub use settle::SettleOnce;

// ============================================================================
// Constants
// ============================================================================

const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

// ============================================================================
// ScreenshotProvider
// ============================================================================

/// Source of full-viewport screenshots.
///
/// Implementations must tolerate being dropped mid-call; the acquirer
/// abandons a request once its deadline passes.
#[async_trait]
pub trait ScreenshotProvider: Send + Sync {
    /// Captures the visible viewport as PNG bytes.
    async fn capture_viewport(&self) -> Result<Vec<u8>>;
}

// ============================================================================
// PageImage
// ============================================================================

/// A captured slide as PNG bytes.
///
/// Cloning shares the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct PageImage {
    png: Arc<[u8]>,
    width: u32,
    height: u32,
}

impl fmt::Debug for PageImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.png.len())
            .finish()
    }
}

impl PageImage {
    /// Wraps already-encoded PNG bytes of known size.
    #[inline]
    #[must_use]
    pub fn new(png: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            png: png.into(),
            width,
            height,
        }
    }

    /// Wraps PNG bytes, reading the size from the header.
    ///
    /// # Errors
    ///
    /// [`Error::Image`] if the bytes are not a readable image.
    pub fn from_png(png: Vec<u8>) -> Result<Self> {
        let (width, height) = ImageReader::new(Cursor::new(&png))
            .with_guessed_format()?
            .into_dimensions()?;
        Ok(Self::new(png, width, height))
    }

    /// Parses a `data:image/png;base64,` URI.
    ///
    /// # Errors
    ///
    /// [`Error::Image`] or [`Error::Protocol`] for anything that is not a
    /// base64 PNG data URI.
    pub fn from_data_uri(uri: &str) -> Result<Self> {
        let payload = uri
            .strip_prefix(PNG_DATA_URI_PREFIX)
            .ok_or_else(|| Error::protocol("Not a PNG data URI"))?;
        let png = Base64Standard
            .decode(payload)
            .map_err(|e| Error::protocol(format!("Invalid base64 image data: {e}")))?;
        Self::from_png(png)
    }

    /// Portable embeddable form.
    #[must_use]
    pub fn data_uri(&self) -> String {
        format!("{PNG_DATA_URI_PREFIX}{}", Base64Standard.encode(&self.png))
    }

    #[inline]
    #[must_use]
    pub fn png(&self) -> &[u8] {
        &self.png
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.png.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use image::{ImageFormat, Rgb, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).expect("encode");
        out.into_inner()
    }

    #[test]
    fn test_from_png_reads_dimensions() {
        let image = PageImage::from_png(png_bytes(31, 17)).expect("png");
        assert_eq!((image.width(), image.height()), (31, 17));
        assert!(!image.is_empty());
    }

    #[test]
    fn test_data_uri_prefix_and_parse() {
        let image = PageImage::from_png(png_bytes(4, 3)).expect("png");
        let uri = image.data_uri();
        assert!(uri.starts_with("data:image/png;base64,"));

        let parsed = PageImage::from_data_uri(&uri).expect("parse");
        assert_eq!(parsed, image);
    }

    #[test]
    fn test_rejects_foreign_data_uri() {
        assert!(PageImage::from_data_uri("data:image/jpeg;base64,AAAA").is_err());
        assert!(PageImage::from_data_uri("data:image/png;base64,!!!").is_err());
    }

    #[test]
    fn test_debug_omits_bytes() {
        let image = PageImage::new(vec![1, 2, 3], 1, 1);
        let text = format!("{image:?}");
        assert!(text.contains("bytes: 3"));
    }
}
