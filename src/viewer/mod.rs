//! Viewer DOM contract and the components that read and drive it.
//!
//! The viewer is an external, non-cooperative page. Everything the engine
//! knows about it goes through the [`ViewerPage`] trait, so the detector and
//! navigator run unchanged against a live tab or an in-process fake.
//!
//! | Component | Role |
//! |-----------|------|
//! | [`ViewerPage`] | Primitive DOM queries and interactions |
//! | [`RenderDetector`] | Page count, current page, render-complete wait |
//! | [`Navigator`] | Step and goto-page with fallback channel |

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// Render-state detection.
pub mod detector;

/// Page navigation with retry and fallback.
pub mod navigator;

// ============================================================================
// Re-exports
// ============================================================================

pub use detector::{RenderDetector, SlideImage};
pub use navigator::{Direction, Navigator};

// ============================================================================
// Types
// ============================================================================

/// Load state of an `<img>` element.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageState {
    /// Value of the `src` attribute, empty when absent.
    pub src: String,
    /// `img.complete`.
    pub complete: bool,
    /// `img.naturalWidth`.
    pub natural_width: u32,
    /// `img.naturalHeight`.
    pub natural_height: u32,
}

impl ImageState {
    /// Returns `true` while the element still shows the placeholder.
    #[inline]
    #[must_use]
    pub fn is_placeholder(&self, marker: &str) -> bool {
        self.src.is_empty() || (!marker.is_empty() && self.src.ends_with(marker))
    }

    /// Returns `true` once real content decoded with non-zero size.
    #[inline]
    #[must_use]
    pub fn is_decoded(&self) -> bool {
        self.complete && self.natural_width > 0 && self.natural_height > 0
    }
}

/// On-screen bounding rectangle in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Returns `true` if either side is zero or negative.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// What a navigation press observes while it waits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeWatch {
    /// Subtree whose mutations are observed.
    pub container: String,
    /// Element whose text is the current page number.
    pub page_number: String,
    /// How long to wait for a change.
    pub ceiling: Duration,
}

/// How a navigation press resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    /// The page number changed.
    Changed,
    /// The ceiling elapsed with no page change.
    Ceiling,
}

// ============================================================================
// ViewerPage
// ============================================================================

/// Primitive operations on the viewer document.
///
/// Missing elements are reported as `None`/`false`; only transport or script
/// failures are errors.
#[async_trait]
pub trait ViewerPage: Send + Sync {
    /// Address of the current document.
    async fn location(&self) -> Result<String>;

    /// Whether `selector` matches at least one element.
    async fn exists(&self, selector: &str) -> Result<bool>;

    /// Trimmed text content of the first match.
    async fn text(&self, selector: &str) -> Result<Option<String>>;

    /// Load state of the first matching image.
    async fn image_state(&self, selector: &str) -> Result<Option<ImageState>>;

    /// Bounding client rectangle of the first match.
    async fn bounding_rect(&self, selector: &str) -> Result<Option<Rect>>;

    /// `window.devicePixelRatio`.
    async fn device_pixel_ratio(&self) -> Result<f64>;

    /// Dispatches a mousedown/mouseup pair on `control` and waits for the
    /// page number to change.
    ///
    /// # Errors
    ///
    /// [`Error::StructuralMismatch`](crate::Error::StructuralMismatch) if the
    /// control or the watched container is missing.
    async fn press(&self, control: &str, watch: &ChangeWatch) -> Result<PressOutcome>;

    /// Triggers the control's release handler from the page's own script
    /// context. Silently does nothing if the page library is absent.
    async fn trigger_in_page(&self, control: &str) -> Result<()>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_detection() {
        let mut state = ImageState::default();
        assert!(state.is_placeholder("blank.gif"));

        state.src = "https://cdn.example/assets/blank.gif".to_string();
        assert!(state.is_placeholder("blank.gif"));

        state.src = "https://cdn.example/page/3.png".to_string();
        assert!(!state.is_placeholder("blank.gif"));
    }

    #[test]
    fn test_decoded_requires_both_dimensions() {
        let state = ImageState {
            src: "a.png".to_string(),
            complete: true,
            natural_width: 1024,
            natural_height: 0,
        };
        assert!(!state.is_decoded());
    }

    #[test]
    fn test_image_state_from_camel_case() {
        let state: ImageState = serde_json::from_str(
            r#"{"src":"x.png","complete":true,"naturalWidth":800,"naturalHeight":600}"#,
        )
        .expect("parse");
        assert!(state.is_decoded());
    }

    #[test]
    fn test_rect_is_empty() {
        assert!(Rect::default().is_empty());
        assert!(
            !Rect {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 5.0
            }
            .is_empty()
        );
    }
}
