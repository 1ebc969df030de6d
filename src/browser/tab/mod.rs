//! Connected browser tab.
//!
//! A [`Tab`] is the tab the bridge extension attached to. It is the live
//! implementation of every browser-side seam the capture engine uses.
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | Tab struct, accessors, command dispatch |
//! | `navigation` | URL, title, reload |
//! | `script` | JavaScript execution in either world |
//! | `screenshot` | Viewport capture ([`ScreenshotProvider`](crate::capture::ScreenshotProvider)) |
//! | `viewer` | [`ViewerPage`](crate::viewer::ViewerPage) over DOM scripts |
//! | `download` | Client-side download ([`DownloadSink`](crate::assembly::DownloadSink)) |
//!
//! # Example
//!
//! ```ignore
//! let (connection, ready) = server.accept().await?;
//! let tab = Tab::new(connection, ready);
//!
//! let url = tab.get_url().await?;
//! let png = tab.capture_png().await?;
//! ```

// ============================================================================
// Submodules
// ============================================================================

mod core;
mod download;
mod navigation;
mod screenshot;
mod script;
mod viewer;

// ============================================================================
// Re-exports
// ============================================================================

pub use core::Tab;
