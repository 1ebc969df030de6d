//! Error types for deck-capture.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use deck_capture::{Error, Result};
//!
//! async fn example(detector: &RenderDetector<'_>) -> Result<()> {
//!     let slide = detector.wait_for_render(3).await?;
//!     println!("slide is {}x{}", slide.natural_width, slide.natural_height);
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Viewer structure | [`Error::StructuralMismatch`], [`Error::NotAViewer`], [`Error::PageCountUnavailable`] |
//! | Capture run | [`Error::NavigationFailed`], [`Error::RenderTimeout`], [`Error::RenderFailed`], [`Error::Acquisition`] |
//! | Output | [`Error::Assembly`], [`Error::Storage`] |
//! | Configuration | [`Error::Config`], [`Error::Profile`], [`Error::BrowserNotFound`], [`Error::ProcessLaunchFailed`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Execution | [`Error::Protocol`], [`Error::ScriptError`], [`Error::Timeout`], [`Error::RequestTimeout`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::Image`], [`Error::WebSocket`], [`Error::ChannelClosed`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::path::PathBuf;
use std::result::Result as StdResult;

use image::ImageError;
use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging. The display text
/// of the capture-run variants is what lands in the session error log.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Viewer Structure Errors
    // ========================================================================
    /// An element the viewer contract requires is missing.
    ///
    /// The viewer's markup changed or the page is a different kind of viewer.
    #[error("Viewer element not found: {element}")]
    StructuralMismatch {
        /// Selector or role of the missing element.
        element: String,
    },

    /// The document is not the expected presentation viewer.
    #[error("Not a presentation viewer")]
    NotAViewer,

    /// The page-count indicator is absent or unparseable.
    #[error("Could not detect page count")]
    PageCountUnavailable,

    // ========================================================================
    // Capture Run Errors
    // ========================================================================
    /// The target page could not be reached within the attempt budget.
    #[error("Failed to navigate to page {target} after {attempts} attempts")]
    NavigationFailed {
        /// Page the navigator was trying to reach.
        target: u32,
        /// Number of attempts made.
        attempts: u32,
    },

    /// The slide image never reached a loaded, non-placeholder state.
    #[error("Timeout waiting for page {page} to render after {timeout_ms}ms")]
    RenderTimeout {
        /// Page being waited on.
        page: u32,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// The slide image finished loading without content.
    #[error("Image load error for page {page}")]
    RenderFailed {
        /// Page whose image failed.
        page: u32,
    },

    /// Screenshot acquisition failed.
    ///
    /// Covers zero-size elements, provider errors, decode and encode failures.
    #[error("Screenshot failed: {message}")]
    Acquisition {
        /// Description of the failing stage.
        message: String,
    },

    // ========================================================================
    // Output Errors
    // ========================================================================
    /// Document assembly failed.
    #[error("Document assembly failed: {message}")]
    Assembly {
        /// Description of the encoder failure.
        message: String,
    },

    /// Durable store operation failed.
    #[error("Storage error for key {key}: {message}")]
    Storage {
        /// Key being read or written.
        key: String,
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Profile error.
    ///
    /// Returned when Firefox profile creation or setup fails.
    #[error("Profile error: {message}")]
    Profile {
        /// Description of the profile error.
        message: String,
    },

    /// Browser binary not found at path.
    #[error("Firefox not found at: {path}")]
    BrowserNotFound {
        /// Path where the binary was expected.
        path: PathBuf,
    },

    /// Failed to launch the browser process.
    #[error("Failed to launch Firefox: {message}")]
    ProcessLaunchFailed {
        /// Description of the launch failure.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection timeout waiting for the bridge extension.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// WebSocket connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// Protocol violation or error response from the bridge.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// JavaScript execution error.
    #[error("Script error: {message}")]
    ScriptError {
        /// Error message from script execution.
        message: String,
    },

    /// Operation timeout.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Command request timeout.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image decode/encode error.
    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a structural mismatch error.
    #[inline]
    pub fn structural(element: impl Into<String>) -> Self {
        Self::StructuralMismatch {
            element: element.into(),
        }
    }

    /// Creates a navigation failure.
    #[inline]
    pub fn navigation_failed(target: u32, attempts: u32) -> Self {
        Self::NavigationFailed { target, attempts }
    }

    /// Creates a render timeout error.
    #[inline]
    pub fn render_timeout(page: u32, timeout_ms: u64) -> Self {
        Self::RenderTimeout { page, timeout_ms }
    }

    /// Creates an acquisition error.
    #[inline]
    pub fn acquisition(message: impl Into<String>) -> Self {
        Self::Acquisition {
            message: message.into(),
        }
    }

    /// Creates an assembly error.
    #[inline]
    pub fn assembly(message: impl Into<String>) -> Self {
        Self::Assembly {
            message: message.into(),
        }
    }

    /// Creates a storage error.
    #[inline]
    pub fn storage(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a profile error.
    #[inline]
    pub fn profile(message: impl Into<String>) -> Self {
        Self::Profile {
            message: message.into(),
        }
    }

    /// Creates a browser not found error.
    #[inline]
    pub fn browser_not_found(path: impl Into<PathBuf>) -> Self {
        Self::BrowserNotFound { path: path.into() }
    }

    /// Creates a process launch failed error.
    #[inline]
    pub fn process_launch_failed(err: IoError) -> Self {
        Self::ProcessLaunchFailed {
            message: err.to_string(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a script error.
    #[inline]
    pub fn script_error(message: impl Into<String>) -> Self {
        Self::ScriptError {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. }
                | Self::Timeout { .. }
                | Self::RequestTimeout { .. }
                | Self::RenderTimeout { .. }
        )
    }

    /// Returns `true` if the viewer does not match the expected markup.
    #[inline]
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::StructuralMismatch { .. } | Self::NotAViewer | Self::PageCountUnavailable
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if a later run may get past this error.
    ///
    /// Structural and configuration errors will fail the same way again.
    #[inline]
    #[must_use]
    pub fn is_resumable(&self) -> bool {
        matches!(
            self,
            Self::NavigationFailed { .. }
                | Self::RenderTimeout { .. }
                | Self::RenderFailed { .. }
                | Self::Acquisition { .. }
                | Self::Assembly { .. }
                | Self::Timeout { .. }
                | Self::RequestTimeout { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
