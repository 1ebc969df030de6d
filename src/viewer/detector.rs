//! Render-state detection.
//!
//! Answers "which page is showing, how many are there, and has the current
//! slide finished rendering?" by polling the viewer DOM. The viewer gives no
//! completion event, so [`RenderDetector::wait_for_render`] is a bounded poll
//! loop raced against a deadline.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tokio::time::{sleep, timeout};
use tracing::{debug, trace};

use crate::config::CaptureConfig;
use crate::error::{Error, Result};

use super::ViewerPage;

// ============================================================================
// Constants
// ============================================================================

/// Denominator of a `current / total` indicator.
static TOTAL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\s*(\d+)").expect("valid total pattern"));

/// Leading integer of the page-number element.
static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)").expect("valid page pattern"));

// ============================================================================
// SlideImage
// ============================================================================

/// Reference to a rendered slide image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideImage {
    /// Page the image belongs to.
    pub page: u32,
    /// Selector that resolves to the image element.
    pub selector: String,
    /// Image source.
    pub src: String,
    /// Decoded width in pixels.
    pub natural_width: u32,
    /// Decoded height in pixels.
    pub natural_height: u32,
}

// ============================================================================
// RenderDetector
// ============================================================================

/// Reads page state from the viewer.
#[derive(Clone)]
pub struct RenderDetector {
    page: Arc<dyn ViewerPage>,
    config: Arc<CaptureConfig>,
}

impl RenderDetector {
    /// Creates a detector over `page`.
    #[must_use]
    pub fn new(page: Arc<dyn ViewerPage>, config: Arc<CaptureConfig>) -> Self {
        Self { page, config }
    }

    /// Returns `true` if the viewer container is present.
    pub async fn is_viewer_present(&self) -> Result<bool> {
        self.page.exists(&self.config.selectors.viewer).await
    }

    /// Total page count from the indicator, 0 if absent or unparseable.
    pub async fn total_pages(&self) -> Result<u32> {
        let text = self
            .page
            .text(&self.config.selectors.page_indicator)
            .await?;
        Ok(text.as_deref().map(parse_total).unwrap_or(0))
    }

    /// Current page number, 0 if absent or unparseable.
    pub async fn current_page(&self) -> Result<u32> {
        let text = self.page.text(&self.config.selectors.page_number).await?;
        Ok(text.as_deref().map(parse_page_number).unwrap_or(0))
    }

    /// Text of the first title element, if any is non-blank.
    pub async fn document_title(&self) -> Result<Option<String>> {
        let text = self.page.text(&self.config.selectors.title).await?;
        Ok(text.filter(|t| !t.trim().is_empty()))
    }

    /// Waits for the active slide of `page` to render, using the configured
    /// ceiling.
    ///
    /// # Errors
    ///
    /// - [`Error::RenderTimeout`] if the ceiling elapses
    /// - [`Error::RenderFailed`] if the image finished loading without content
    pub async fn wait_for_render(&self, page: u32) -> Result<SlideImage> {
        self.wait_for_render_within(page, self.config.timings.render_timeout())
            .await
    }

    /// Waits for the active slide of `page` to render within `ceiling`.
    ///
    /// # Errors
    ///
    /// Same as [`wait_for_render`](Self::wait_for_render).
    pub async fn wait_for_render_within(&self, page: u32, ceiling: Duration) -> Result<SlideImage> {
        debug!(page, ceiling_ms = ceiling.as_millis() as u64, "Waiting for slide render");

        // Dropping the poll loop on the deadline is the only way it settles
        // after the timeout, so a late "ready" can never be observed.
        match timeout(ceiling, self.poll_until_rendered(page)).await {
            Ok(result) => result,
            Err(_) => Err(Error::render_timeout(page, ceiling.as_millis() as u64)),
        }
    }

    async fn poll_until_rendered(&self, page: u32) -> Result<SlideImage> {
        let selectors = &self.config.selectors;
        let interval = self.config.timings.poll_interval();

        loop {
            if let Some(state) = self.page.image_state(&selectors.active_image).await? {
                let placeholder = state.is_placeholder(&selectors.placeholder_marker);

                if !placeholder && state.is_decoded() {
                    debug!(
                        page,
                        width = state.natural_width,
                        height = state.natural_height,
                        "Slide rendered"
                    );
                    return Ok(SlideImage {
                        page,
                        selector: selectors.active_image.clone(),
                        src: state.src,
                        natural_width: state.natural_width,
                        natural_height: state.natural_height,
                    });
                }

                // A finished load with no pixels is the browser's broken-image state.
                if !placeholder && state.complete && state.natural_width == 0 {
                    return Err(Error::RenderFailed { page });
                }

                trace!(page, placeholder, complete = state.complete, "Slide not ready");
            }

            sleep(interval).await;
        }
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Extracts the denominator of `current / total`.
#[must_use]
pub fn parse_total(text: &str) -> u32 {
    TOTAL_PATTERN
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Extracts the leading integer of a page-number label.
#[must_use]
pub fn parse_page_number(text: &str) -> u32 {
    LEADING_NUMBER
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

// ============================================================================
// Tests
// ============================================================================
