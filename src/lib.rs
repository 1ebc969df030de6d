//! deck-capture - resumable slide-viewer capture.
//!
//! Walks a paginated presentation viewer one slide at a time, screenshots
//! each fully rendered slide, persists every capture as it is taken, and
//! assembles the set into a single PDF named after the document title.
//! A run that is paused, crashes, or has its page reloaded resumes from the
//! first uncaptured page.
//!
//! # Architecture
//!
//! The engine talks to the browser through three seams, each a trait:
//!
//! - [`ViewerPage`]: DOM primitives on the viewer document
//! - [`ScreenshotProvider`]: raster capture of the visible viewport
//! - [`DownloadSink`]: delivery of the finished document
//!
//! [`Tab`] implements all three over a WebSocket bridge extension, in the
//! same client/server shape as a WebExtension-based driver:
//!
//! - **Local end (Rust)**: binds the server, sends commands, owns the state
//! - **Remote end (extension)**: executes scripts and screenshots in the tab
//!
//! # Quick Start
//!
//! ```no_run
//! use std::net::{IpAddr, Ipv4Addr};
//! use std::sync::Arc;
//!
//! use deck_capture::{
//!     CaptureConfig, CaptureOrchestrator, Collaborators, FileSink, FileStore, PdfEncoder,
//!     Tab, transport::PendingServer,
//! };
//!
//! #[tokio::main]
//! async fn main() -> deck_capture::Result<()> {
//!     let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 9515).await?;
//!     let (connection, ready) = server.accept().await?;
//!     let tab = Arc::new(Tab::new(connection, ready));
//!
//!     let orchestrator = CaptureOrchestrator::new(
//!         Collaborators {
//!             page: tab.clone(),
//!             screenshots: tab,
//!             store: Arc::new(FileStore::open("./state")?),
//!             encoder: Arc::new(PdfEncoder::new()),
//!             sink: Arc::new(FileSink::new("./out")),
//!         },
//!         CaptureConfig::default(),
//!     );
//!
//!     let outcome = orchestrator.run().await;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`orchestrator`] | Capture state machine and control surface |
//! | [`session`] | In-memory session record and status |
//! | [`viewer`] | Page-count discovery, render detection, navigation |
//! | [`capture`] | Screenshot acquisition and cropping |
//! | [`store`] | Durable progress persistence |
//! | [`assembly`] | PDF assembly and delivery |
//! | [`events`] | Progress event fan-out |
//! | [`config`] | Selectors, timings, storage settings |
//! | [`browser`] | [`Tab`] over the bridge |
//! | [`driver`] | Optional Firefox launcher |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Bridge message types (internal) |
//! | [`transport`] | WebSocket transport layer (internal) |

// ============================================================================
// Modules
// ============================================================================

/// Document assembly and delivery.
pub mod assembly;

/// Browser-side handles.
pub mod browser;

/// Screenshot acquisition.
pub mod capture;

/// Capture configuration.
pub mod config;

/// Optional Firefox launcher.
pub mod driver;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Progress events.
pub mod events;

/// Type-safe identifiers.
pub mod identifiers;

/// Capture orchestration.
pub mod orchestrator;

/// Bridge protocol message types.
pub mod protocol;

/// Capture session state.
pub mod session;

/// Durable progress persistence.
pub mod store;

/// WebSocket transport layer.
pub mod transport;

/// Viewer page access.
pub mod viewer;

// ============================================================================
// Re-exports
// ============================================================================

// Engine
pub use orchestrator::{CaptureOrchestrator, Collaborators, RunOutcome};
pub use session::{CaptureFailure, CaptureSession, CaptureStatus, Phase};
pub use events::{ProgressEvent, ProgressHub};
pub use config::{CaptureConfig, CaptureTimings, StorageConfig, ViewerSelectors};

// Seams
pub use viewer::ViewerPage;
pub use capture::{PageImage, ScreenshotProvider};
pub use store::{DurableStore, FileStore, MemoryStore, ProgressStore};
pub use assembly::{Delivery, DocumentEncoder, DownloadSink, FileSink, PdfEncoder};

// Browser
pub use browser::Tab;
pub use driver::{Browser, Launcher, LauncherBuilder};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{RequestId, SessionId, TabId};
