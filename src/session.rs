//! Capture session state.
//!
//! [`CaptureSession`] is the one mutable record of a run. The orchestrator
//! owns it behind a mutex and hands out clones; cloning is cheap because
//! page images share their bytes.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::capture::PageImage;

// ============================================================================
// Phase
// ============================================================================

/// State of the capture state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Idle,
    Discovering,
    Resuming,
    Navigating,
    WaitingRender,
    Capturing,
    Persisting,
    Compiling,
    Done,
    Paused,
    Error,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Discovering => "discovering",
            Self::Resuming => "resuming",
            Self::Navigating => "navigating",
            Self::WaitingRender => "waiting-render",
            Self::Capturing => "capturing",
            Self::Persisting => "persisting",
            Self::Compiling => "compiling",
            Self::Done => "done",
            Self::Paused => "paused",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

// ============================================================================
// CaptureFailure
// ============================================================================

/// One entry of the error log.
///
/// Page 0 marks failures outside the per-page loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureFailure {
    pub page: u32,
    #[serde(rename = "error")]
    pub message: String,
}

impl CaptureFailure {
    #[must_use]
    pub fn new(page: u32, message: impl Into<String>) -> Self {
        Self {
            page,
            message: message.into(),
        }
    }
}

// ============================================================================
// CaptureSession
// ============================================================================

/// In-memory record of a run.
#[derive(Debug, Clone, Default)]
pub struct CaptureSession {
    pub is_capturing: bool,
    pub is_paused: bool,
    /// Discovered page count, 0 while unknown.
    pub total_pages: u32,
    pub captured_pages: BTreeMap<u32, PageImage>,
    /// Address of the captured document.
    pub document_url: String,
    pub errors: Vec<CaptureFailure>,
    pub phase: Phase,
}

impl CaptureSession {
    /// Number of captured pages.
    #[inline]
    #[must_use]
    pub fn captured_count(&self) -> u32 {
        self.captured_pages.len() as u32
    }

    /// Lowest page in `1..=total_pages` not yet captured.
    #[must_use]
    pub fn next_uncaptured(&self) -> Option<u32> {
        (1..=self.total_pages).find(|p| !self.captured_pages.contains_key(p))
    }

    /// Returns `true` once every page is captured.
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total_pages > 0 && self.captured_count() >= self.total_pages
    }

    /// Records a capture. Out-of-range or repeated pages are ignored.
    ///
    /// Returns `true` if the image was stored.
    pub fn record(&mut self, page: u32, image: PageImage) -> bool {
        if page == 0 || (self.total_pages > 0 && page > self.total_pages) {
            return false;
        }
        if self.captured_pages.contains_key(&page) {
            return false;
        }
        self.captured_pages.insert(page, image);
        true
    }

    /// Appends to the error log.
    pub fn log_failure(&mut self, page: u32, message: impl Into<String>) {
        self.errors.push(CaptureFailure::new(page, message));
    }

    /// Marks the run paused. Clears `is_capturing` in the same step.
    pub fn pause(&mut self) {
        self.is_capturing = false;
        self.is_paused = true;
    }

    /// Drops all progress and returns to idle.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Control-surface view of this session.
    #[must_use]
    pub fn status(&self, is_presentation: bool) -> CaptureStatus {
        CaptureStatus {
            is_presentation,
            is_capturing: self.is_capturing,
            total_pages: self.total_pages,
            captured_count: self.captured_count(),
            errors: self.errors.clone(),
        }
    }
}

// ============================================================================
// CaptureStatus
// ============================================================================

/// Status reported to the control surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureStatus {
    pub is_presentation: bool,
    pub is_capturing: bool,
    pub total_pages: u32,
    pub captured_count: u32,
    pub errors: Vec<CaptureFailure>,
}

// ============================================================================
// Tests
// ============================================================================
