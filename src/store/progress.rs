//! Capture progress records.
//!
//! Layout in the underlying [`DurableStore`]:
//!
//! | Key | Value |
//! |-----|-------|
//! | `<prefix>_meta` | JSON `{totalPages, documentUrl, capturedPageNumbers, errors}` |
//! | `<prefix>_page_<n>` | `data:image/png;base64,...` text of page `n` |
//! | auto-start key | address of the document to resume after reload |
//!
//! Page records are written before the metadata that lists them. A crash
//! between the two leaves an unlisted page record, never a listed page
//! without one.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::capture::PageImage;
use crate::config::StorageConfig;
use crate::error::Result;
use crate::session::{CaptureFailure, CaptureSession};

use super::DurableStore;

// ============================================================================
// Records
// ============================================================================

/// The metadata record on its own, without page images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub total_pages: u32,
    pub document_url: String,
    /// Ascending.
    pub captured_page_numbers: Vec<u32>,
    #[serde(default)]
    pub errors: Vec<CaptureFailure>,
}

/// Session reconstructed from the store.
#[derive(Debug, Clone, Default)]
pub struct PersistedSession {
    pub total_pages: u32,
    pub document_url: String,
    pub captured_pages: BTreeMap<u32, PageImage>,
    pub errors: Vec<CaptureFailure>,
}

impl PersistedSession {
    /// Number of recovered pages.
    #[inline]
    #[must_use]
    pub fn captured_count(&self) -> u32 {
        self.captured_pages.len() as u32
    }

    /// Returns `true` if this session belongs to `location`.
    #[inline]
    #[must_use]
    pub fn belongs_to(&self, location: &str) -> bool {
        self.document_url == location
    }
}

// ============================================================================
// ProgressStore
// ============================================================================

/// Reads and writes capture progress.
pub struct ProgressStore {
    store: Arc<dyn DurableStore>,
    prefix: String,
    auto_start_key: String,
    /// Pages whose record this instance has already written.
    written: Mutex<FxHashSet<u32>>,
}

impl ProgressStore {
    /// Creates a progress store over `store` with the configured key layout.
    #[must_use]
    pub fn new(store: Arc<dyn DurableStore>, storage: &StorageConfig) -> Self {
        Self {
            store,
            prefix: storage.key_prefix.clone(),
            auto_start_key: storage.auto_start_key.clone(),
            written: Mutex::new(FxHashSet::default()),
        }
    }

    #[inline]
    #[must_use]
    pub fn meta_key(&self) -> String {
        format!("{}_meta", self.prefix)
    }

    #[inline]
    #[must_use]
    pub fn page_key(&self, page: u32) -> String {
        format!("{}_page_{page}", self.prefix)
    }

    // ------------------------------------------------------------------------
    // Session records
    // ------------------------------------------------------------------------

    /// Writes page records not yet written, then the metadata record.
    ///
    /// # Errors
    ///
    /// Propagates store errors. Pages written before a failure stay marked
    /// as written.
    pub async fn save(&self, session: &CaptureSession) -> Result<()> {
        let pending: Vec<(u32, &PageImage)> = {
            let written = self.written.lock();
            session
                .captured_pages
                .iter()
                .filter(|(page, _)| !written.contains(page))
                .map(|(page, image)| (*page, image))
                .collect()
        };

        for (page, image) in pending {
            self.store
                .set(&self.page_key(page), image.data_uri().into_bytes())
                .await?;
            self.written.lock().insert(page);
            debug!(page, "Page record written");
        }

        let meta = SessionSummary {
            total_pages: session.total_pages,
            document_url: session.document_url.clone(),
            captured_page_numbers: session.captured_pages.keys().copied().collect(),
            errors: session.errors.clone(),
        };
        self.store
            .set(&self.meta_key(), serde_json::to_vec(&meta)?)
            .await?;

        debug!(
            captured = meta.captured_page_numbers.len(),
            total = meta.total_pages,
            "Progress saved"
        );
        Ok(())
    }

    /// Reconstructs the stored session, if any.
    ///
    /// Does not compare addresses. Listed pages whose record is missing or
    /// unreadable are left out and logged. Only the pages read back count as
    /// written afterwards.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn load(&self) -> Result<Option<PersistedSession>> {
        let Some(meta) = self.read_meta().await? else {
            self.written.lock().clear();
            return Ok(None);
        };

        let mut captured_pages = BTreeMap::new();
        for page in meta.captured_page_numbers {
            if page == 0 || page > meta.total_pages {
                warn!(page, total = meta.total_pages, "Stored page outside document, ignored");
                continue;
            }

            let Some(raw) = self.store.get(&self.page_key(page)).await? else {
                warn!(page, "Stored page record missing, will recapture");
                continue;
            };

            let decoded = String::from_utf8(raw)
                .map_err(|e| e.to_string())
                .and_then(|uri| PageImage::from_data_uri(&uri).map_err(|e| e.to_string()));
            match decoded {
                Ok(image) => {
                    captured_pages.insert(page, image);
                }
                Err(e) => warn!(page, error = %e, "Stored page record unreadable, will recapture"),
            }
        }

        // Pages missing from the store must be written again when recaptured.
        *self.written.lock() = captured_pages.keys().copied().collect();

        Ok(Some(PersistedSession {
            total_pages: meta.total_pages,
            document_url: meta.document_url,
            captured_pages,
            errors: meta.errors,
        }))
    }

    /// Deletes the metadata and every page record it lists.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn clear(&self) -> Result<()> {
        let mut pages: FxHashSet<u32> = std::mem::take(&mut *self.written.lock());
        if let Some(meta) = self.read_meta().await? {
            pages.extend(meta.captured_page_numbers);
        }

        for page in &pages {
            self.store.remove(&self.page_key(*page)).await?;
        }
        self.store.remove(&self.meta_key()).await?;

        debug!(pages = pages.len(), "Progress cleared");
        Ok(())
    }

    /// Reads only the metadata record.
    ///
    /// # Errors
    ///
    /// Propagates store errors. Unreadable metadata counts as absent.
    pub async fn summary(&self) -> Result<Option<SessionSummary>> {
        self.read_meta().await
    }

    async fn read_meta(&self) -> Result<Option<SessionSummary>> {
        let Some(raw) = self.store.get(&self.meta_key()).await? else {
            return Ok(None);
        };
        match serde_json::from_slice(&raw) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) => {
                warn!(error = %e, "Stored progress metadata unreadable, ignored");
                Ok(None)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Auto-start flag
    // ------------------------------------------------------------------------

    /// Requests a capture of `url` once it loads again.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn arm_auto_start(&self, url: &str) -> Result<()> {
        self.store
            .set(&self.auto_start_key, url.as_bytes().to_vec())
            .await
    }

    /// Stored auto-start address, if armed.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn peek_auto_start(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .get(&self.auto_start_key)
            .await?
            .and_then(|raw| String::from_utf8(raw).ok())
            .filter(|url| !url.is_empty()))
    }

    /// Consumes the flag if `location` is the armed document.
    ///
    /// Query strings are ignored. Returns `true` if the flag was consumed.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn take_auto_start(&self, location: &str) -> Result<bool> {
        let Some(armed) = self.peek_auto_start().await? else {
            return Ok(false);
        };
        if !location.starts_with(&without_query(&armed)) {
            debug!(armed, location, "Auto-start armed for another document");
            return Ok(false);
        }
        self.store.remove(&self.auto_start_key).await?;
        Ok(true)
    }
}

/// `address` with query and fragment removed.
fn without_query(address: &str) -> String {
    match Url::parse(address) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => address
            .split(['?', '#'])
            .next()
            .unwrap_or(address)
            .to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
