//! Page navigation with retry and fallback.
//!
//! Two interaction channels reach the viewer's navigation handler:
//!
//! | Channel | Mechanism |
//! |---------|-----------|
//! | Primary | synthetic mousedown + mouseup on the control, observed through DOM mutations |
//! | Fallback | the page's own jQuery `trigger("mouseup")`, run in the main world |
//!
//! The fallback is used only when the primary step left the page number
//! unchanged. The attempt budget counts steps that made no progress toward
//! the target; a hard cap of `distance + budget` steps bounds oscillation.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::CaptureConfig;
use crate::error::{Error, Result};

use super::{ChangeWatch, PressOutcome, RenderDetector, ViewerPage};

// ============================================================================
// Direction
// ============================================================================

/// Navigation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Next page.
    Forward,
    /// Previous page.
    Backward,
}

impl Direction {
    /// Direction that moves `current` toward `target`.
    #[inline]
    #[must_use]
    pub fn toward(current: u32, target: u32) -> Self {
        if current < target {
            Self::Forward
        } else {
            Self::Backward
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => f.write_str("forward"),
            Self::Backward => f.write_str("backward"),
        }
    }
}

// ============================================================================
// Navigator
// ============================================================================

/// Moves the viewer between pages.
#[derive(Clone)]
pub struct Navigator {
    page: Arc<dyn ViewerPage>,
    config: Arc<CaptureConfig>,
    detector: RenderDetector,
}

impl Navigator {
    /// Creates a navigator over `page`.
    #[must_use]
    pub fn new(page: Arc<dyn ViewerPage>, config: Arc<CaptureConfig>) -> Self {
        let detector = RenderDetector::new(Arc::clone(&page), Arc::clone(&config));
        Self {
            page,
            config,
            detector,
        }
    }

    /// Selector of the control for `direction`.
    #[inline]
    #[must_use]
    pub fn control(&self, direction: Direction) -> &str {
        match direction {
            Direction::Forward => &self.config.selectors.next_button,
            Direction::Backward => &self.config.selectors.prev_button,
        }
    }

    /// Presses the control for `direction` once.
    ///
    /// Resolves with [`PressOutcome::Changed`] as soon as the page number
    /// moves, or [`PressOutcome::Ceiling`] when the ceiling elapses first.
    /// The caller re-reads the page number either way.
    ///
    /// # Errors
    ///
    /// [`Error::StructuralMismatch`] if the control or the slide container is
    /// missing.
    pub async fn step(&self, direction: Direction) -> Result<PressOutcome> {
        let selectors = &self.config.selectors;
        let control = self.control(direction);

        if !self.page.exists(control).await? {
            return Err(Error::structural(control));
        }
        if !self.page.exists(&selectors.slide_container).await? {
            return Err(Error::structural(&selectors.slide_container));
        }

        let before = self.detector.current_page().await?;
        let watch = ChangeWatch {
            container: selectors.slide_container.clone(),
            page_number: selectors.page_number.clone(),
            ceiling: self.config.timings.nav_step_ceiling(),
        };

        let outcome = self.page.press(control, &watch).await?;
        debug!(%direction, before, ?outcome, "Navigation step");
        Ok(outcome)
    }

    /// Navigates until the viewer shows `target`.
    ///
    /// # Errors
    ///
    /// - [`Error::NavigationFailed`] when the attempt budget runs out
    /// - [`Error::StructuralMismatch`] from [`step`](Self::step)
    pub async fn goto_page(&self, target: u32) -> Result<()> {
        let timings = &self.config.timings;
        let mut current = self.detector.current_page().await?;
        if current == target {
            return Ok(());
        }

        let max_stalled = timings.max_nav_attempts;
        let max_steps = current.abs_diff(target).saturating_add(max_stalled);
        let mut stalled = 0u32;
        let mut steps = 0u32;

        debug!(current, target, "Navigating to page");

        while current != target {
            if stalled >= max_stalled || steps >= max_steps {
                return Err(Error::navigation_failed(target, steps));
            }
            steps += 1;

            let direction = Direction::toward(current, target);
            self.step(direction).await?;
            sleep(timings.nav_settle()).await;

            let mut now = self.detector.current_page().await?;
            if now == current {
                debug!(%direction, page = current, "Primary step had no effect, using in-page fallback");
                if let Err(e) = self.page.trigger_in_page(self.control(direction)).await {
                    warn!(error = %e, "In-page fallback failed");
                }
                sleep(timings.fallback_settle()).await;
                now = self.detector.current_page().await?;
            }

            if now.abs_diff(target) >= current.abs_diff(target) {
                stalled += 1;
            }
            current = now;
        }

        debug!(target, steps, "Reached page");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
