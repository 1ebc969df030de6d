//! Document assembly and delivery.
//!
//! | Item | Role |
//! |------|------|
//! | [`DocumentEncoder`] | Ordered page images to document bytes |
//! | [`PdfEncoder`] | One PDF page per image at native pixel size |
//! | [`DownloadSink`] | Where the finished document goes |
//! | [`FileSink`] | Writes into a local directory |
//! | [`DocumentAssembler`] | Orders captures, encodes, names and delivers |

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use crate::capture::PageImage;
use crate::config::DEFAULT_FILENAME;
use crate::error::{Error, Result};

// ============================================================================
// Submodules
// ============================================================================

/// PDF encoding.
pub mod pdf;

/// Delivery targets.
pub mod sink;

// ============================================================================
// Re-exports
// ============================================================================

pub use pdf::PdfEncoder;
pub use sink::FileSink;

// ============================================================================
// Constants
// ============================================================================

/// Characters kept in a filename stem.
static FILENAME_STRIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9\s\-_]").expect("valid filename pattern"));

// ============================================================================
// Traits
// ============================================================================

/// Turns ordered page images into one document.
pub trait DocumentEncoder: Send + Sync {
    /// MIME type of the produced document.
    fn media_type(&self) -> &'static str;

    /// Encodes `pages` in the given order.
    ///
    /// `on_page` is called with each page number before that page is added.
    ///
    /// # Errors
    ///
    /// [`Error::Assembly`] on any encoding failure.
    fn encode(&self, pages: &[(u32, PageImage)], on_page: &mut dyn FnMut(u32)) -> Result<Vec<u8>>;
}

/// Receives the finished document.
#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Hands `bytes` over under `filename`.
    async fn deliver(&self, filename: &str, media_type: &str, bytes: Vec<u8>) -> Result<Delivery>;
}

/// Result of a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Name the document was delivered under.
    pub filename: String,
    /// Local path, when the sink wrote a file.
    pub path: Option<PathBuf>,
    /// Document size in bytes.
    pub bytes: usize,
}

// ============================================================================
// Filename
// ============================================================================

/// Filename for a document titled `title`.
///
/// Strips everything outside `[A-Za-z0-9\s\-_]`, trims, and appends `.pdf`.
/// Falls back to the default name when nothing is left.
#[must_use]
pub fn document_filename(title: Option<&str>) -> String {
    title
        .map(sanitize_title)
        .filter(|stem| !stem.is_empty())
        .map(|stem| format!("{stem}.pdf"))
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

/// Title with disallowed characters removed and whitespace trimmed.
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    FILENAME_STRIP.replace_all(title.trim(), "").trim().to_string()
}

// ============================================================================
// DocumentAssembler
// ============================================================================

/// Builds and delivers the final document.
#[derive(Clone)]
pub struct DocumentAssembler {
    encoder: Arc<dyn DocumentEncoder>,
    sink: Arc<dyn DownloadSink>,
}

impl DocumentAssembler {
    #[must_use]
    pub fn new(encoder: Arc<dyn DocumentEncoder>, sink: Arc<dyn DownloadSink>) -> Self {
        Self { encoder, sink }
    }

    /// Captures for `1..=total` in page order, skipping missing pages.
    #[must_use]
    pub fn ordered_pages(captured: &BTreeMap<u32, PageImage>, total: u32) -> Vec<(u32, PageImage)> {
        captured
            .range(1..=total.max(1))
            .filter(|(page, _)| **page <= total)
            .map(|(page, image)| (*page, image.clone()))
            .collect()
    }

    /// Encodes the captures and delivers the document.
    ///
    /// Encoding runs on a blocking worker. `on_page` receives each page
    /// number as it is handed to the encoder.
    ///
    /// # Errors
    ///
    /// [`Error::Assembly`] if there are no pages, encoding fails or the sink
    /// rejects the document.
    pub async fn assemble<F>(
        &self,
        captured: &BTreeMap<u32, PageImage>,
        total: u32,
        title: Option<&str>,
        on_page: F,
    ) -> Result<Delivery>
    where
        F: FnMut(u32) + Send + 'static,
    {
        let pages = Self::ordered_pages(captured, total);
        if pages.is_empty() {
            return Err(Error::assembly("no captured pages"));
        }

        let count = pages.len();
        let encoder = Arc::clone(&self.encoder);
        let mut on_page = on_page;
        let bytes = tokio::task::spawn_blocking(move || encoder.encode(&pages, &mut on_page))
            .await
            .map_err(|e| Error::assembly(format!("encoder task failed: {e}")))??;

        let filename = document_filename(title);
        debug!(%filename, pages = count, bytes = bytes.len(), "Document encoded");

        let delivery = self
            .sink
            .deliver(&filename, self.encoder.media_type(), bytes)
            .await
            .map_err(|e| match e {
                Error::Assembly { .. } => e,
                other => Error::assembly(other.to_string()),
            })?;

        info!(filename = %delivery.filename, pages = count, "Document delivered");
        Ok(delivery)
    }
}

// ============================================================================
// Tests
// ============================================================================
