//! In-process viewer used by the integration tests.
//!
//! [`FakeViewer`] answers the viewer's DOM contract from plain state: a page
//! counter, a total, a title and per-page render behavior. [`FakeScreen`]
//! paints a viewport whose colour encodes the page on screen, so a captured
//! image can be traced back to the page it came from.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::sync::Semaphore;

use deck_capture::config::{CaptureTimings, ViewerSelectors};
use deck_capture::viewer::{ChangeWatch, ImageState, PressOutcome, Rect};
use deck_capture::{
    CaptureConfig, CaptureOrchestrator, Collaborators, Delivery, DocumentEncoder, DownloadSink,
    DurableStore, Error, MemoryStore, PageImage, PdfEncoder, ProgressEvent, Result,
    ScreenshotProvider, ViewerPage,
};

pub const DECK_URL: &str = "https://docsend.com/view/abc123";

const VIEWPORT: (u32, u32) = (64, 48);
const SLIDE: Rect = Rect {
    x: 8.0,
    y: 4.0,
    width: 40.0,
    height: 30.0,
};

// ============================================================================
// FakeViewer
// ============================================================================

#[derive(Debug)]
struct ViewerState {
    location: String,
    total: u32,
    current: u32,
    title: Option<String>,
    /// Pages whose image never leaves the placeholder.
    never_renders: FxHashSet<u32>,
    /// Next-button presses are ignored everywhere.
    next_stuck: bool,
    presses: u32,
}

pub struct FakeViewer {
    selectors: ViewerSelectors,
    state: Mutex<ViewerState>,
}

impl FakeViewer {
    pub fn new(total: u32) -> Arc<Self> {
        Arc::new(Self {
            selectors: ViewerSelectors::default(),
            state: Mutex::new(ViewerState {
                location: DECK_URL.to_string(),
                total,
                current: 1,
                title: Some("Q3 Board Deck".to_string()),
                never_renders: FxHashSet::default(),
                next_stuck: false,
                presses: 0,
            }),
        })
    }

    pub fn set_location(&self, location: &str) {
        self.state.lock().location = location.to_string();
    }

    pub fn set_title(&self, title: Option<&str>) {
        self.state.lock().title = title.map(str::to_string);
    }

    pub fn never_render(&self, page: u32) {
        self.state.lock().never_renders.insert(page);
    }

    pub fn heal(&self) {
        let mut state = self.state.lock();
        state.never_renders.clear();
        state.next_stuck = false;
    }

    pub fn jam_next(&self) {
        self.state.lock().next_stuck = true;
    }

    pub fn current(&self) -> u32 {
        self.state.lock().current
    }

    pub fn presses(&self) -> u32 {
        self.state.lock().presses
    }

    pub fn reload(&self) {
        self.state.lock().current = 1;
    }
}

#[async_trait]
impl ViewerPage for FakeViewer {
    async fn location(&self) -> Result<String> {
        Ok(self.state.lock().location.clone())
    }

    async fn exists(&self, _selector: &str) -> Result<bool> {
        Ok(true)
    }

    async fn text(&self, selector: &str) -> Result<Option<String>> {
        let state = self.state.lock();
        let s = &self.selectors;
        Ok(if selector == s.page_indicator {
            Some(format!("{} / {}", state.current, state.total))
        } else if selector == s.page_number {
            Some(state.current.to_string())
        } else if selector == s.title {
            state.title.clone()
        } else {
            None
        })
    }

    async fn image_state(&self, _selector: &str) -> Result<Option<ImageState>> {
        let state = self.state.lock();
        if state.never_renders.contains(&state.current) {
            return Ok(Some(ImageState {
                src: format!("/assets/{}", self.selectors.placeholder_marker),
                complete: true,
                natural_width: 1,
                natural_height: 1,
            }));
        }
        Ok(Some(ImageState {
            src: format!("https://cdn.example.com/page_{}.png", state.current),
            complete: true,
            natural_width: 1024,
            natural_height: 768,
        }))
    }

    async fn bounding_rect(&self, _selector: &str) -> Result<Option<Rect>> {
        Ok(Some(SLIDE))
    }

    async fn device_pixel_ratio(&self) -> Result<f64> {
        Ok(1.0)
    }

    async fn press(&self, control: &str, _watch: &ChangeWatch) -> Result<PressOutcome> {
        let mut state = self.state.lock();
        state.presses += 1;
        let before = state.current;
        if control == self.selectors.next_button {
            if !state.next_stuck && state.current < state.total {
                state.current += 1;
            }
        } else if control == self.selectors.prev_button && state.current > 1 {
            state.current -= 1;
        }
        Ok(if state.current != before {
            PressOutcome::Changed
        } else {
            PressOutcome::Ceiling
        })
    }

    async fn trigger_in_page(&self, _control: &str) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// FakeScreen
// ============================================================================

/// Viewport painter. Optionally pauses the orchestrator while capturing a
/// chosen page.
pub struct FakeScreen {
    viewer: Arc<FakeViewer>,
    shots: Mutex<Vec<u32>>,
    pause_on: Mutex<Option<u32>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    orchestrator: OnceLock<CaptureOrchestrator>,
}

impl FakeScreen {
    pub fn new(viewer: Arc<FakeViewer>) -> Arc<Self> {
        Arc::new(Self {
            viewer,
            shots: Mutex::new(Vec::new()),
            pause_on: Mutex::new(None),
            gate: Mutex::new(None),
            orchestrator: OnceLock::new(),
        })
    }

    /// Pages screenshotted so far, in order.
    pub fn shots(&self) -> Vec<u32> {
        self.shots.lock().clone()
    }

    pub fn pause_on(&self, page: u32) {
        *self.pause_on.lock() = Some(page);
    }

    /// Makes every screenshot wait for a permit on the returned gate.
    pub fn hold(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub fn attach(&self, orchestrator: &CaptureOrchestrator) {
        let _ = self.orchestrator.set(orchestrator.clone());
    }
}

/// Colour painted for `page`.
pub fn page_colour(page: u32) -> Rgb<u8> {
    Rgb([(page * 20 % 256) as u8, 100, 200])
}

#[async_trait]
impl ScreenshotProvider for FakeScreen {
    async fn capture_viewport(&self) -> Result<Vec<u8>> {
        let page = self.viewer.current();
        self.shots.lock().push(page);

        if *self.pause_on.lock() == Some(page)
            && let Some(orchestrator) = self.orchestrator.get()
        {
            orchestrator.stop();
        }

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|_| Error::acquisition("screen gate closed"))?
                .forget();
        }

        let raster = RgbImage::from_pixel(VIEWPORT.0, VIEWPORT.1, page_colour(page));
        let mut png = Cursor::new(Vec::new());
        raster
            .write_to(&mut png, ImageFormat::Png)
            .map_err(Error::from)?;
        Ok(png.into_inner())
    }
}

// ============================================================================
// CollectSink
// ============================================================================

/// Keeps delivered documents in memory.
#[derive(Default)]
pub struct CollectSink {
    pub delivered: Mutex<Vec<(String, Vec<u8>)>>,
}

#[async_trait]
impl DownloadSink for CollectSink {
    async fn deliver(&self, filename: &str, _media_type: &str, bytes: Vec<u8>) -> Result<Delivery> {
        let size = bytes.len();
        self.delivered.lock().push((filename.to_string(), bytes));
        Ok(Delivery {
            filename: filename.to_string(),
            path: None,
            bytes: size,
        })
    }
}

// ============================================================================
// HeldStore
// ============================================================================

/// Memory store whose metadata writes can be held back.
#[derive(Default)]
pub struct HeldStore {
    inner: MemoryStore,
    meta_gate: Mutex<Option<Arc<Semaphore>>>,
    meta_waiting: AtomicUsize,
}

impl HeldStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every metadata write wait for a permit on the returned gate.
    pub fn hold_meta(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.meta_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    /// Metadata writes currently waiting on the gate.
    pub fn meta_waiting(&self) -> usize {
        self.meta_waiting.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DurableStore for HeldStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let gate = self.meta_gate.lock().clone();
        if key.ends_with("_meta")
            && let Some(gate) = gate
        {
            self.meta_waiting.fetch_add(1, Ordering::SeqCst);
            let permit = gate.acquire().await;
            self.meta_waiting.fetch_sub(1, Ordering::SeqCst);
            permit
                .map_err(|_| Error::acquisition("store gate closed"))?
                .forget();
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key).await
    }
}

// ============================================================================
// FailingEncoder
// ============================================================================

/// Encoder that rejects every document.
pub struct FailingEncoder;

impl DocumentEncoder for FailingEncoder {
    fn media_type(&self) -> &'static str {
        "application/pdf"
    }

    fn encode(&self, _pages: &[(u32, PageImage)], _on_page: &mut dyn FnMut(u32)) -> Result<Vec<u8>> {
        Err(Error::assembly("disk full"))
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub viewer: Arc<FakeViewer>,
    pub screen: Arc<FakeScreen>,
    pub store: Arc<dyn DurableStore>,
    pub sink: Arc<CollectSink>,
    pub orchestrator: CaptureOrchestrator,
}

impl Harness {
    pub fn new(total: u32) -> Self {
        Self::with_store(FakeViewer::new(total), Arc::new(MemoryStore::new()))
    }

    pub fn with_store(viewer: Arc<FakeViewer>, store: Arc<dyn DurableStore>) -> Self {
        Self::with_parts(viewer, store, Arc::new(PdfEncoder::new()))
    }

    pub fn with_parts(
        viewer: Arc<FakeViewer>,
        store: Arc<dyn DurableStore>,
        encoder: Arc<dyn DocumentEncoder>,
    ) -> Self {
        let screen = FakeScreen::new(Arc::clone(&viewer));
        let sink = Arc::new(CollectSink::default());
        let orchestrator = CaptureOrchestrator::new(
            Collaborators {
                page: Arc::clone(&viewer) as Arc<dyn ViewerPage>,
                screenshots: Arc::clone(&screen) as Arc<dyn ScreenshotProvider>,
                store: Arc::clone(&store),
                encoder,
                sink: Arc::clone(&sink) as Arc<dyn DownloadSink>,
            },
            test_config(),
        );
        screen.attach(&orchestrator);

        Self {
            viewer,
            screen,
            store,
            sink,
            orchestrator,
        }
    }

    /// A fresh orchestrator over the same viewer and store, as after a
    /// process restart.
    pub fn restart(&self) -> Self {
        Self::with_store(Arc::clone(&self.viewer), Arc::clone(&self.store))
    }

    /// Collects every event published from now on.
    pub fn record_events(&self) -> Arc<Mutex<Vec<ProgressEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        self.orchestrator
            .hub()
            .on_event(Box::new(move |event| sink.lock().push(event.clone())));
        events
    }
}

pub fn test_config() -> CaptureConfig {
    CaptureConfig {
        timings: CaptureTimings::instant(),
        ..CaptureConfig::default()
    }
}

/// Decodes a persisted page and returns the colour of its top-left pixel.
pub fn pixel_of(image: &PageImage) -> Rgb<u8> {
    let decoded = image::load_from_memory(image.png())
        .expect("captured page decodes")
        .to_rgb8();
    *decoded.get_pixel(0, 0)
}

/// A capture of `page` as the acquirer would have produced it.
pub fn solid_page(page: u32) -> PageImage {
    let raster = RgbImage::from_pixel(SLIDE.width as u32, SLIDE.height as u32, page_colour(page));
    let mut png = Cursor::new(Vec::new());
    raster
        .write_to(&mut png, ImageFormat::Png)
        .expect("encode test page");
    PageImage::from_png(png.into_inner()).expect("decode test page")
}
