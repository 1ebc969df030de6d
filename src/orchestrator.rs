//! Capture orchestration.
//!
//! [`CaptureOrchestrator`] runs the capture state machine:
//!
//! ```text
//! Idle -> Discovering -> Resuming -> [ Navigating -> WaitingRender -> Capturing -> Persisting ]*
//!      -> Compiling -> Done
//! ```
//!
//! `Paused` and `Error` can be entered from any per-page state; `Error` also
//! from discovery, resume and compilation. Pages are captured in ascending
//! order and each page is persisted before the loop moves on, so a run that
//! stops for any reason can be resumed by starting again.
//!
//! # Control surface
//!
//! | Method | Effect |
//! |--------|--------|
//! | [`run`](CaptureOrchestrator::run) | Runs to completion, pause or failure |
//! | [`start`](CaptureOrchestrator::start) | Spawns [`run`](CaptureOrchestrator::run) |
//! | [`stop`](CaptureOrchestrator::stop) | Pauses after the current page |
//! | [`clear`](CaptureOrchestrator::clear) | Drops all progress |
//! | [`status`](CaptureOrchestrator::status) | Snapshot for display |
//! | [`arm_auto_start`](CaptureOrchestrator::arm_auto_start) | Resume after reload |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::assembly::{Delivery, DocumentAssembler, DocumentEncoder, DownloadSink};
use crate::capture::{ScreenshotAcquirer, ScreenshotProvider};
use crate::config::CaptureConfig;
use crate::error::{Error, Result};
use crate::events::{ProgressEvent, ProgressHub};
use crate::session::{CaptureFailure, CaptureSession, CaptureStatus, Phase};
use crate::store::{DurableStore, ProgressStore};
use crate::viewer::{Navigator, RenderDetector, ViewerPage};

// ============================================================================
// Collaborators
// ============================================================================

/// External services the orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub page: Arc<dyn ViewerPage>,
    pub screenshots: Arc<dyn ScreenshotProvider>,
    pub store: Arc<dyn DurableStore>,
    pub encoder: Arc<dyn DocumentEncoder>,
    pub sink: Arc<dyn DownloadSink>,
}

// ============================================================================
// RunOutcome
// ============================================================================

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another run holds the session.
    AlreadyRunning,
    /// Every page captured and the document delivered.
    Completed(Delivery),
    /// Paused or cleared before finishing.
    Stopped,
    /// Halted on an error; progress up to it is kept.
    Failed(CaptureFailure),
}

impl RunOutcome {
    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

// ============================================================================
// CaptureOrchestrator
// ============================================================================

/// Handle to the capture engine. Clones share one session.
#[derive(Clone)]
pub struct CaptureOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<CaptureConfig>,
    page: Arc<dyn ViewerPage>,
    detector: RenderDetector,
    navigator: Navigator,
    acquirer: ScreenshotAcquirer,
    progress: ProgressStore,
    assembler: DocumentAssembler,
    hub: ProgressHub,
    session: Mutex<CaptureSession>,
    /// Held for the duration of a run.
    run_lock: AsyncMutex<()>,
    /// Bumped by `clear`; captures started under an older epoch are dropped.
    epoch: AtomicU64,
    /// Serializes writes and deletes of persisted progress.
    persist_lock: AsyncMutex<()>,
}

impl CaptureOrchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(collaborators: Collaborators, config: CaptureConfig) -> Self {
        let config = Arc::new(config);
        let Collaborators {
            page,
            screenshots,
            store,
            encoder,
            sink,
        } = collaborators;

        let inner = Inner {
            detector: RenderDetector::new(Arc::clone(&page), Arc::clone(&config)),
            navigator: Navigator::new(Arc::clone(&page), Arc::clone(&config)),
            acquirer: ScreenshotAcquirer::new(
                Arc::clone(&page),
                screenshots,
                config.timings.screenshot_timeout(),
            ),
            progress: ProgressStore::new(store, &config.storage),
            assembler: DocumentAssembler::new(encoder, sink),
            hub: ProgressHub::new(),
            session: Mutex::new(CaptureSession::default()),
            run_lock: AsyncMutex::new(()),
            epoch: AtomicU64::new(0),
            persist_lock: AsyncMutex::new(()),
            page,
            config,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn config(&self) -> &CaptureConfig {
        &self.inner.config
    }

    /// Event fan-out for this orchestrator.
    #[inline]
    #[must_use]
    pub fn hub(&self) -> &ProgressHub {
        &self.inner.hub
    }

    /// Receiver for events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.inner.hub.subscribe()
    }

    /// Current state-machine state.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.inner.session.lock().phase
    }

    /// Copy of the in-memory session.
    #[must_use]
    pub fn session(&self) -> CaptureSession {
        self.inner.session.lock().clone()
    }

    /// Persisted progress records.
    #[inline]
    #[must_use]
    pub fn progress(&self) -> &ProgressStore {
        &self.inner.progress
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Runs a capture until it completes, pauses or fails.
    ///
    /// Returns [`RunOutcome::AlreadyRunning`] without side effects if a run
    /// is in progress.
    pub async fn run(&self) -> RunOutcome {
        let Ok(_running) = self.inner.run_lock.try_lock() else {
            debug!("Capture already running");
            return RunOutcome::AlreadyRunning;
        };

        {
            let mut session = self.inner.session.lock();
            if session.is_capturing {
                return RunOutcome::AlreadyRunning;
            }
            session.is_capturing = true;
            session.is_paused = false;
        }

        info!("Capture run started");
        let outcome = self.inner.execute().await;
        info!(?outcome, "Capture run finished");
        outcome
    }

    /// Spawns [`run`](Self::run) and returns immediately.
    pub fn start(&self) -> JoinHandle<RunOutcome> {
        let this = self.clone();
        tokio::spawn(async move { this.run().await })
    }

    /// Requests a pause. The page in progress still completes.
    ///
    /// Returns `true` if a run was capturing.
    pub fn stop(&self) -> bool {
        let mut session = self.inner.session.lock();
        if !session.is_capturing {
            return false;
        }
        session.pause();
        debug!("Pause requested");
        true
    }

    /// Drops in-memory and persisted progress.
    ///
    /// A run in progress stops at the next page boundary and its in-flight
    /// capture is discarded. A save already under way finishes first and is
    /// then deleted with everything else.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn clear(&self) -> Result<()> {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        let _persist = self.inner.persist_lock.lock().await;
        self.inner.session.lock().reset();
        self.inner.progress.clear().await?;
        info!("Capture progress cleared");
        Ok(())
    }

    /// Status snapshot.
    ///
    /// The captured count comes from the persisted session when it belongs
    /// to the current document.
    ///
    /// # Errors
    ///
    /// Propagates viewer and store errors.
    pub async fn status(&self) -> Result<CaptureStatus> {
        let inner = &self.inner;
        let is_presentation = inner.detector.is_viewer_present().await?;
        let total_pages = inner.detector.total_pages().await?;
        let location = inner.page.location().await?;

        let mut status = inner.session.lock().status(is_presentation);
        status.total_pages = total_pages;

        if let Some(summary) = inner.progress.summary().await?
            && summary.document_url == location
        {
            status.captured_count = summary.captured_page_numbers.len() as u32;
        }
        Ok(status)
    }

    /// Arms a capture of `url` after the next reload.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn arm_auto_start(&self, url: &str) -> Result<()> {
        self.inner.progress.arm_auto_start(url).await?;
        debug!(url, "Auto-start armed");
        Ok(())
    }

    /// Consumes an armed auto-start for the current document and starts.
    ///
    /// Waits the configured delay first, then starts only if the viewer is
    /// present and the page count is known.
    ///
    /// # Errors
    ///
    /// Propagates viewer and store errors.
    pub async fn check_auto_start(&self) -> Result<Option<JoinHandle<RunOutcome>>> {
        let inner = &self.inner;
        let location = inner.page.location().await?;
        if !inner.progress.take_auto_start(&location).await? {
            return Ok(None);
        }

        sleep(inner.config.timings.auto_start_delay()).await;

        if inner.detector.is_viewer_present().await? && inner.detector.total_pages().await? > 0 {
            info!(location, "Auto-starting capture");
            Ok(Some(self.start()))
        } else {
            warn!(location, "Auto-start armed but viewer not ready");
            Ok(None)
        }
    }
}

// ============================================================================
// Completion
// ============================================================================

/// Where a run goes once the page loop exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Paused,
    Cleared,
    Compile,
    Incomplete { captured: u32, total: u32 },
}

impl Completion {
    fn after_loop(session: &CaptureSession, cleared: bool) -> Self {
        if cleared {
            return Self::Cleared;
        }
        if session.is_paused {
            return Self::Paused;
        }
        let captured = session.captured_count();
        if captured >= session.total_pages {
            Self::Compile
        } else {
            Self::Incomplete {
                captured,
                total: session.total_pages,
            }
        }
    }
}

// ============================================================================
// Run
// ============================================================================

impl Inner {
    fn set_phase(&self, phase: Phase) {
        let mut session = self.session.lock();
        if session.phase != phase {
            debug!(from = %session.phase, to = %phase, "Phase");
            session.phase = phase;
        }
    }

    fn publish(&self, event: ProgressEvent) {
        self.hub.publish(event);
    }

    async fn execute(&self) -> RunOutcome {
        let epoch = self.epoch.load(Ordering::SeqCst);

        // --------------------------------------------------------------------
        // Discovery
        // --------------------------------------------------------------------

        self.set_phase(Phase::Discovering);
        let total = match self.discover().await {
            Ok(total) => total,
            Err(e) => return self.fail_before_loop(&e),
        };

        // --------------------------------------------------------------------
        // Resume
        // --------------------------------------------------------------------

        self.set_phase(Phase::Resuming);
        if let Err(e) = self.resume(total).await {
            return self.fail_before_loop(&e);
        }

        let (complete, paused, captured) = {
            let session = self.session.lock();
            (session.is_complete(), session.is_paused, session.captured_count())
        };
        if complete && !paused {
            debug!(total, "All pages already captured");
            self.session.lock().is_capturing = false;
            return self.compile(total).await;
        }

        self.publish(ProgressEvent::Capturing {
            progress: captured,
            total,
        });

        // --------------------------------------------------------------------
        // Per-page loop
        // --------------------------------------------------------------------

        loop {
            let next = {
                let session = self.session.lock();
                if !session.is_capturing || session.is_paused {
                    None
                } else {
                    session.next_uncaptured()
                }
            };
            let Some(page) = next else {
                break;
            };

            if let Err(e) = self.capture_page(page, total, epoch).await {
                return self.fail_in_loop(&e, epoch).await;
            }
        }

        // --------------------------------------------------------------------
        // Completion
        // --------------------------------------------------------------------

        let completion = {
            let mut session = self.session.lock();
            session.is_capturing = false;
            let cleared = self.epoch.load(Ordering::SeqCst) != epoch;
            Completion::after_loop(&session, cleared)
        };

        match completion {
            Completion::Paused | Completion::Cleared => {
                self.set_phase(if completion == Completion::Paused {
                    Phase::Paused
                } else {
                    Phase::Idle
                });
                info!(?completion, total, "Capture stopped");
                self.publish(ProgressEvent::Stopped);
                RunOutcome::Stopped
            }
            Completion::Compile => self.compile(total).await,
            Completion::Incomplete { captured, total } => {
                let failure =
                    CaptureFailure::new(0, format!("Incomplete: captured {captured}/{total} pages"));
                warn!(captured, total, "Capture incomplete");
                self.set_phase(Phase::Error);
                self.publish(ProgressEvent::page_error(0, failure.message.clone()));
                RunOutcome::Failed(failure)
            }
        }
    }

    async fn discover(&self) -> Result<u32> {
        if !self.detector.is_viewer_present().await? {
            return Err(Error::NotAViewer);
        }
        let total = self.detector.total_pages().await?;
        if total == 0 {
            return Err(Error::PageCountUnavailable);
        }
        debug!(total, "Page count discovered");
        Ok(total)
    }

    async fn resume(&self, total: u32) -> Result<()> {
        let location = self.page.location().await?;
        let persisted = self.progress.load().await?;

        let adopted = match persisted {
            Some(saved) if saved.belongs_to(&location) => {
                info!(
                    captured = saved.captured_count(),
                    total, "Resuming persisted capture"
                );
                Some(saved)
            }
            Some(stale) => {
                info!(stale = %stale.document_url, "Discarding progress of another document");
                let _persist = self.persist_lock.lock().await;
                self.progress.clear().await?;
                None
            }
            None => None,
        };

        let mut session = self.session.lock();
        session.total_pages = total;
        session.document_url = location;
        session.captured_pages.clear();
        session.errors.clear();
        if let Some(saved) = adopted {
            for (page, image) in saved.captured_pages {
                session.record(page, image);
            }
            session.errors = saved.errors;
        }
        Ok(())
    }

    async fn capture_page(&self, page: u32, total: u32, epoch: u64) -> Result<()> {
        self.set_phase(Phase::Navigating);
        if self.detector.current_page().await? != page {
            self.navigator.goto_page(page).await?;
        }

        self.set_phase(Phase::WaitingRender);
        let slide = self.detector.wait_for_render(page).await?;
        sleep(self.config.timings.post_render_delay()).await;

        self.set_phase(Phase::Capturing);
        let image = self.acquirer.capture(&slide).await?;

        self.set_phase(Phase::Persisting);
        let _persist = self.persist_lock.lock().await;
        let snapshot = {
            let mut session = self.session.lock();
            if self.epoch.load(Ordering::SeqCst) != epoch {
                debug!(page, "Progress cleared during capture, page dropped");
                return Ok(());
            }
            session.record(page, image);
            session.clone()
        };
        self.progress.save(&snapshot).await?;

        debug!(page, captured = snapshot.captured_count(), total, "Page captured");
        self.publish(ProgressEvent::Capturing {
            progress: snapshot.captured_count(),
            total,
        });
        Ok(())
    }

    fn fail_before_loop(&self, error: &Error) -> RunOutcome {
        let failure = CaptureFailure::new(0, error.to_string());
        warn!(error = %error, "Capture cannot start");
        {
            let mut session = self.session.lock();
            session.is_capturing = false;
            session.phase = Phase::Error;
        }
        self.publish(ProgressEvent::page_error(0, failure.message.clone()));
        RunOutcome::Failed(failure)
    }

    async fn fail_in_loop(&self, error: &Error, epoch: u64) -> RunOutcome {
        let page = self.detector.current_page().await.unwrap_or(0);
        let failure = CaptureFailure::new(page, error.to_string());
        warn!(page, error = %error, resumable = error.is_resumable(), "Capture halted");

        let _persist = self.persist_lock.lock().await;
        let snapshot = {
            let mut session = self.session.lock();
            session.is_capturing = false;
            session.phase = Phase::Error;
            let current = self.epoch.load(Ordering::SeqCst) == epoch;
            if current {
                session.errors.push(failure.clone());
            }
            current.then(|| session.clone())
        };
        if let Some(snapshot) = snapshot
            && let Err(e) = self.progress.save(&snapshot).await
        {
            warn!(error = %e, "Failed to persist error log");
        }

        self.publish(ProgressEvent::page_error(page, failure.message.clone()));
        RunOutcome::Failed(failure)
    }

    async fn compile(&self, total: u32) -> RunOutcome {
        self.set_phase(Phase::Compiling);
        self.publish(ProgressEvent::Compiling { progress: 0, total });

        let title = match self.detector.document_title().await {
            Ok(title) => title,
            Err(e) => {
                warn!(error = %e, "Could not read document title");
                None
            }
        };
        let pages = self.session.lock().captured_pages.clone();

        let hub = self.hub.clone();
        let on_page = move |page: u32| hub.publish(ProgressEvent::Compiling { progress: page, total });

        match self.assembler.assemble(&pages, total, title.as_deref(), on_page).await {
            Ok(delivery) => {
                let _persist = self.persist_lock.lock().await;
                if let Err(e) = self.progress.clear().await {
                    warn!(error = %e, "Failed to clear persisted progress");
                }
                {
                    let mut session = self.session.lock();
                    session.captured_pages.clear();
                    session.errors.clear();
                    session.is_capturing = false;
                    session.phase = Phase::Done;
                }
                self.publish(ProgressEvent::Done);
                RunOutcome::Completed(delivery)
            }
            Err(e) => {
                let failure = CaptureFailure::new(0, e.to_string());
                warn!(error = %e, "Document assembly failed, captures kept");
                self.set_phase(Phase::Error);
                self.publish(ProgressEvent::page_error(0, failure.message.clone()));
                RunOutcome::Failed(failure)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
