//! Viewport capture and cropping.
//!
//! One acquisition is: read the slide's bounding box and the device pixel
//! ratio, ask the provider for a full-viewport PNG, crop it to the box scaled
//! by the ratio, and re-encode as PNG. All stages share one deadline. The
//! decode/crop/encode stage runs on a blocking worker and reports through a
//! [`SettleOnce`], so a result arriving after the deadline is dropped.

// ============================================================================
// Imports
// ============================================================================

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use image::{GenericImageView, ImageFormat};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{Instant, timeout_at};
use tracing::debug;

use crate::error::{Error, Result};
use crate::viewer::{Rect, SlideImage, ViewerPage};

use super::settle::SettleOnce;
use super::{PageImage, ScreenshotProvider};

// ============================================================================
// CropRegion
// ============================================================================

/// Crop rectangle in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Scales `rect` by `dpr`, rounds to whole pixels and clamps to the raster.
///
/// Returns `None` if nothing of the rectangle lies inside the raster.
#[must_use]
pub fn crop_region(rect: Rect, dpr: f64, raster_width: u32, raster_height: u32) -> Option<CropRegion> {
    if raster_width == 0 || raster_height == 0 {
        return None;
    }

    let to_px = |v: f64| -> u32 { (v * dpr).round().clamp(0.0, u32::MAX as f64) as u32 };

    let x = to_px(rect.x).min(raster_width.saturating_sub(1));
    let y = to_px(rect.y).min(raster_height.saturating_sub(1));
    let width = to_px(rect.width).min(raster_width.saturating_sub(x));
    let height = to_px(rect.height).min(raster_height.saturating_sub(y));

    (width > 0 && height > 0).then_some(CropRegion {
        x,
        y,
        width,
        height,
    })
}

/// Decodes `raw`, crops it and encodes the result as PNG.
///
/// # Errors
///
/// [`Error::Acquisition`] for decode, empty-crop and encode failures.
pub fn crop_to_png(raw: &[u8], rect: Rect, dpr: f64) -> Result<PageImage> {
    let img = image::load_from_memory(raw)
        .map_err(|e| Error::acquisition(format!("Failed to load screenshot for cropping: {e}")))?;

    let (img_width, img_height) = img.dimensions();
    let region = crop_region(rect, dpr, img_width, img_height).ok_or_else(|| {
        Error::acquisition(format!(
            "Slide box {rect:?} at {dpr}x lies outside the {img_width}x{img_height} screenshot"
        ))
    })?;

    let cropped = img.crop_imm(region.x, region.y, region.width, region.height);

    let mut output = Cursor::new(Vec::new());
    cropped
        .write_to(&mut output, ImageFormat::Png)
        .map_err(|e| Error::acquisition(format!("Failed to encode PNG: {e}")))?;

    Ok(PageImage::new(output.into_inner(), region.width, region.height))
}

// ============================================================================
// ScreenshotAcquirer
// ============================================================================

/// Produces one cropped [`PageImage`] per slide.
///
/// Only one provider request is outstanding at a time.
pub struct ScreenshotAcquirer {
    page: Arc<dyn ViewerPage>,
    provider: Arc<dyn ScreenshotProvider>,
    budget: Duration,
    turn: AsyncMutex<()>,
}

impl ScreenshotAcquirer {
    /// Creates an acquirer with a per-capture time budget.
    #[must_use]
    pub fn new(page: Arc<dyn ViewerPage>, provider: Arc<dyn ScreenshotProvider>, budget: Duration) -> Self {
        Self {
            page,
            provider,
            budget,
            turn: AsyncMutex::new(()),
        }
    }

    /// Captures the rendered `slide`.
    ///
    /// # Errors
    ///
    /// [`Error::Acquisition`] if the slide box is empty, the provider fails
    /// or times out, or the crop stage fails or times out.
    pub async fn capture(&self, slide: &SlideImage) -> Result<PageImage> {
        let _turn = self.turn.lock().await;
        let deadline = Instant::now() + self.budget;
        let budget_ms = self.budget.as_millis() as u64;

        let geometry = async {
            let rect = self
                .page
                .bounding_rect(&slide.selector)
                .await?
                .ok_or_else(|| Error::acquisition("No slide image in active item"))?;
            if rect.is_empty() {
                return Err(Error::acquisition("Slide image has zero dimensions"));
            }

            let dpr = match self.page.device_pixel_ratio().await? {
                r if r.is_finite() && r > 0.0 => r,
                _ => 1.0,
            };
            Ok::<_, Error>((rect, dpr))
        };
        let (rect, dpr) = timeout_at(deadline, geometry).await.map_err(|_| {
            Error::acquisition(format!("Slide geometry not available within {budget_ms}ms"))
        })??;

        let raw = match timeout_at(deadline, self.provider.capture_viewport()).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return Err(Error::acquisition(format!("Screenshot provider failed: {e}"))),
            Err(_) => {
                return Err(Error::acquisition(format!(
                    "Screenshot timeout: provider did not respond within {budget_ms}ms"
                )));
            }
        };

        debug!(page = slide.page, bytes = raw.len(), dpr, ?rect, "Viewport captured");

        let (guard, settled) = SettleOnce::new();
        let worker = guard.clone();
        tokio::task::spawn_blocking(move || {
            if !worker.settle(crop_to_png(&raw, rect, dpr)) {
                debug!("Crop finished after deadline, result dropped");
            }
        });

        match timeout_at(deadline, settled).await {
            Ok(Ok(result)) => {
                let image = result?;
                debug!(page = slide.page, width = image.width(), height = image.height(), "Slide cropped");
                Ok(image)
            }
            Ok(Err(_)) => Err(Error::acquisition("Crop worker stopped before finishing")),
            Err(_) => {
                guard.cancel();
                Err(Error::acquisition(format!("Crop timeout after {budget_ms}ms")))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
