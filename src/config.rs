//! Capture configuration.
//!
//! Three groups, all with working defaults for the DocSend viewer:
//!
//! | Group | Contents |
//! |-------|----------|
//! | [`ViewerSelectors`] | CSS selectors of the viewer's DOM contract |
//! | [`CaptureTimings`] | poll intervals, settle delays, ceilings, attempt budget |
//! | [`StorageConfig`] | durable-store key prefix and state directory |
//!
//! Any subset can be overridden from a TOML file:
//!
//! ```toml
//! [timings]
//! render_timeout_ms = 45000
//!
//! [selectors]
//! next_button = "#nextPageButton"
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Filename used when the document has no usable title.
pub const DEFAULT_FILENAME: &str = "docsend-presentation.pdf";

/// Default key prefix in the durable store.
pub const DEFAULT_KEY_PREFIX: &str = "docsend_capture_state";

/// Default key of the resume-after-reload flag.
pub const DEFAULT_AUTO_START_KEY: &str = "docsend_auto_start";

// ============================================================================
// CaptureConfig
// ============================================================================

/// Complete configuration for a capture run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// DOM contract of the viewer.
    pub selectors: ViewerSelectors,
    /// Timing policy.
    pub timings: CaptureTimings,
    /// Durable store layout.
    pub storage: StorageConfig,
}

impl CaptureConfig {
    /// Parses a configuration from TOML text.
    ///
    /// Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on malformed TOML or invalid values.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| Error::config(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file is unreadable or invalid.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read {}: {e}", path.display()))
        })?;

        debug!(path = %path.display(), "Loaded capture config");
        Self::from_toml_str(&text)
    }

    /// Checks values that would make a run impossible.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.timings.max_nav_attempts == 0 {
            return Err(Error::config("timings.max_nav_attempts must be at least 1"));
        }
        if self.timings.poll_interval_ms == 0 {
            return Err(Error::config("timings.poll_interval_ms must be non-zero"));
        }
        if self.storage.key_prefix.trim().is_empty() {
            return Err(Error::config("storage.key_prefix must not be empty"));
        }
        if self.selectors.active_image.trim().is_empty() {
            return Err(Error::config("selectors.active_image must not be empty"));
        }
        Ok(())
    }
}

// ============================================================================
// ViewerSelectors
// ============================================================================

/// CSS selectors and markers that make up the viewer's DOM contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSelectors {
    /// Container whose presence identifies the viewer.
    pub viewer: String,
    /// Indicator holding `current / total`.
    pub page_indicator: String,
    /// Element holding the current page number.
    pub page_number: String,
    /// Forward navigation control.
    pub next_button: String,
    /// Backward navigation control.
    pub prev_button: String,
    /// Subtree observed for slide changes.
    pub slide_container: String,
    /// Image of the active slide.
    pub active_image: String,
    /// Source fragment marking a not-yet-loaded placeholder.
    pub placeholder_marker: String,
    /// Elements whose text titles the document, first match wins.
    pub title: String,
}

impl Default for ViewerSelectors {
    fn default() -> Self {
        Self {
            viewer: ".carousel.js-viewer.viewer".to_string(),
            page_indicator: ".toolbar-page-indicator".to_string(),
            page_number: "#page-number".to_string(),
            next_button: "#nextPageButton".to_string(),
            prev_button: "#prevPageButton".to_string(),
            slide_container: ".js-carousel-inner".to_string(),
            active_image: ".item.active img.preso-view.page-view".to_string(),
            placeholder_marker: "blank.gif".to_string(),
            title: ".presentation-title, .document-name, title".to_string(),
        }
    }
}

// ============================================================================
// CaptureTimings
// ============================================================================

/// Timing policy, stored as milliseconds for readable config files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureTimings {
    /// Render-state poll interval.
    pub poll_interval_ms: u64,
    /// Ceiling for a slide to render.
    pub render_timeout_ms: u64,
    /// Ceiling for one navigation step to show a page change.
    pub nav_step_ceiling_ms: u64,
    /// Settle delay after a primary navigation step.
    pub nav_settle_ms: u64,
    /// Settle delay after the in-page fallback.
    pub fallback_settle_ms: u64,
    /// Navigation attempts allowed without progress.
    pub max_nav_attempts: u32,
    /// Delay between render-complete and screenshot.
    pub post_render_delay_ms: u64,
    /// Budget for one screenshot acquisition.
    pub screenshot_timeout_ms: u64,
    /// Delay before an armed auto-start fires after reload.
    pub auto_start_delay_ms: u64,
    /// Grace period before a browser download releases its object URL.
    pub download_grace_ms: u64,
}

impl Default for CaptureTimings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
            render_timeout_ms: 30_000,
            nav_step_ceiling_ms: 10_000,
            nav_settle_ms: 300,
            fallback_settle_ms: 500,
            max_nav_attempts: 5,
            post_render_delay_ms: 500,
            screenshot_timeout_ms: 15_000,
            auto_start_delay_ms: 1_000,
            download_grace_ms: 10_000,
        }
    }
}

impl CaptureTimings {
    /// Near-zero timings for tests against in-process fakes.
    #[must_use]
    pub fn instant() -> Self {
        Self {
            poll_interval_ms: 1,
            render_timeout_ms: 200,
            nav_step_ceiling_ms: 50,
            nav_settle_ms: 0,
            fallback_settle_ms: 0,
            max_nav_attempts: 5,
            post_render_delay_ms: 0,
            screenshot_timeout_ms: 1_000,
            auto_start_delay_ms: 0,
            download_grace_ms: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[inline]
    #[must_use]
    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    #[inline]
    #[must_use]
    pub fn nav_step_ceiling(&self) -> Duration {
        Duration::from_millis(self.nav_step_ceiling_ms)
    }

    #[inline]
    #[must_use]
    pub fn nav_settle(&self) -> Duration {
        Duration::from_millis(self.nav_settle_ms)
    }

    #[inline]
    #[must_use]
    pub fn fallback_settle(&self) -> Duration {
        Duration::from_millis(self.fallback_settle_ms)
    }

    #[inline]
    #[must_use]
    pub fn post_render_delay(&self) -> Duration {
        Duration::from_millis(self.post_render_delay_ms)
    }

    #[inline]
    #[must_use]
    pub fn screenshot_timeout(&self) -> Duration {
        Duration::from_millis(self.screenshot_timeout_ms)
    }

    #[inline]
    #[must_use]
    pub fn auto_start_delay(&self) -> Duration {
        Duration::from_millis(self.auto_start_delay_ms)
    }

    #[inline]
    #[must_use]
    pub fn download_grace(&self) -> Duration {
        Duration::from_millis(self.download_grace_ms)
    }
}

// ============================================================================
// StorageConfig
// ============================================================================

/// Durable store layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Prefix of the metadata and page record keys.
    pub key_prefix: String,
    /// Key of the resume-after-reload flag.
    pub auto_start_key: String,
    /// Directory of the file-backed store. `None` uses the platform data dir.
    pub state_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            auto_start_key: DEFAULT_AUTO_START_KEY.to_string(),
            state_dir: None,
        }
    }
}

impl StorageConfig {
    /// Resolves the state directory.
    ///
    /// Falls back to `<data dir>/deck-capture`, then to `.deck-capture`.
    #[must_use]
    pub fn resolved_state_dir(&self) -> PathBuf {
        if let Some(dir) = &self.state_dir {
            return dir.clone();
        }
        dirs::data_local_dir()
            .map(|d| d.join("deck-capture"))
            .unwrap_or_else(|| PathBuf::from(".deck-capture"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_viewer() {
        let config = CaptureConfig::default();
        assert_eq!(config.selectors.next_button, "#nextPageButton");
        assert_eq!(config.selectors.placeholder_marker, "blank.gif");
        assert_eq!(config.timings.max_nav_attempts, 5);
        assert_eq!(config.timings.render_timeout(), Duration::from_secs(30));
        assert_eq!(config.storage.key_prefix, "docsend_capture_state");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CaptureConfig::from_toml_str(
            r#"
            [timings]
            render_timeout_ms = 45000

            [storage]
            key_prefix = "deck"
            "#,
        )
        .expect("parse");

        assert_eq!(config.timings.render_timeout_ms, 45_000);
        assert_eq!(config.timings.poll_interval_ms, 200);
        assert_eq!(config.storage.key_prefix, "deck");
        assert_eq!(config.selectors, ViewerSelectors::default());
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let err = CaptureConfig::from_toml_str("[timings]\nmax_nav_attempts = 0\n")
            .expect_err("should reject");
        assert!(err.to_string().contains("max_nav_attempts"));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        assert!(CaptureConfig::from_toml_str("[timings\n").is_err());
    }

    #[test]
    fn test_explicit_state_dir_wins() {
        let storage = StorageConfig {
            state_dir: Some(PathBuf::from("/tmp/deck")),
            ..StorageConfig::default()
        };
        assert_eq!(storage.resolved_state_dir(), PathBuf::from("/tmp/deck"));
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("capture.toml");
        fs::write(&path, "[selectors]\nviewer = \"#deck\"\n").expect("write");

        let config = CaptureConfig::from_toml_file(&path).expect("load");
        assert_eq!(config.selectors.viewer, "#deck");
    }
}
