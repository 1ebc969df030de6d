//! Progress events.
//!
//! The orchestrator publishes a [`ProgressEvent`] at every externally visible
//! transition. [`ProgressHub`] fans each one out to broadcast subscribers and
//! registered callbacks. Publishing with nobody listening is fine.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

// ============================================================================
// Constants
// ============================================================================

const CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// ProgressEvent
// ============================================================================

/// Outbound progress notification.
///
/// Serializes as `{"phase": "...", ...}` with absent fields omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum ProgressEvent {
    /// Capture loop progress.
    Capturing { progress: u32, total: u32 },
    /// Document assembly progress.
    Compiling { progress: u32, total: u32 },
    /// Document delivered.
    Done,
    /// Run halted on an error.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page: Option<u32>,
        error: String,
    },
    /// Run paused by the user.
    Stopped,
}

impl ProgressEvent {
    /// Error event with no page attached.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            page: None,
            error: message.into(),
        }
    }

    /// Error event for `page`.
    #[must_use]
    pub fn page_error(page: u32, message: impl Into<String>) -> Self {
        Self::Error {
            page: Some(page),
            error: message.into(),
        }
    }

    /// Returns `true` for events that end a run.
    #[inline]
    #[must_use]
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. } | Self::Stopped)
    }
}

// ============================================================================
// ProgressHub
// ============================================================================

/// Callback invoked for every published event.
pub type ProgressListener = Box<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Fan-out point for progress events.
#[derive(Clone)]
pub struct ProgressHub {
    sender: broadcast::Sender<ProgressEvent>,
    listeners: Arc<Mutex<Vec<ProgressListener>>>,
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressHub {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// New receiver for events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    /// Registers a callback.
    pub fn on_event(&self, listener: ProgressListener) {
        self.listeners.lock().push(listener);
    }

    /// Delivers `event` to every listener and subscriber.
    pub fn publish(&self, event: ProgressEvent) {
        trace!(?event, "Publishing progress");
        for listener in self.listeners.lock().iter() {
            listener(&event);
        }
        // No receivers is not an error.
        let _ = self.sender.send(event);
    }
}

// ============================================================================
// Tests
// ============================================================================
