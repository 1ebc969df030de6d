//! Viewport capture.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use tracing::debug;

use crate::capture::ScreenshotProvider;
use crate::error::{Error, Result};
use crate::protocol::{BrowsingContextCommand, Command};

use super::Tab;

// ============================================================================
// Tab - Screenshot
// ============================================================================

impl Tab {
    /// Captures the visible viewport as base64 PNG.
    ///
    /// Uses the browser's native `captureVisibleTab`, so the result is the
    /// composited page at device resolution.
    pub async fn capture_png_base64(&self) -> Result<String> {
        debug!(tab_id = %self.inner.tab_id, "Capturing viewport");

        let command = Command::BrowsingContext(BrowsingContextCommand::CaptureScreenshot {
            format: "png".to_string(),
            quality: None,
        });
        let response = self.send_command(command).await?;

        let data = response.get_string("data");
        if data.is_empty() {
            let got = response
                .result
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "null".to_string());
            return Err(Error::protocol(format!(
                "Screenshot response missing data field. Got: {got}"
            )));
        }

        // Some bridges answer with a full data URI.
        Ok(data
            .split_once("base64,")
            .map(|(_, payload)| payload.to_string())
            .unwrap_or(data))
    }

    /// Captures the visible viewport as PNG bytes.
    pub async fn capture_png(&self) -> Result<Vec<u8>> {
        let encoded = self.capture_png_base64().await?;
        Base64Standard
            .decode(encoded.as_bytes())
            .map_err(|e| Error::protocol(format!("Failed to decode base64: {e}")))
    }
}

#[async_trait]
impl ScreenshotProvider for Tab {
    async fn capture_viewport(&self) -> Result<Vec<u8>> {
        self.capture_png().await
    }
}
