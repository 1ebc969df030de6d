//! Client-side download of a finished document.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use tracing::debug;

use crate::assembly::{Delivery, DownloadSink};
use crate::error::Result;

use super::Tab;
use super::script::json_string;

// ============================================================================
// Script
// ============================================================================

/// Builds a Blob from base64, clicks a temporary anchor, and revokes the
/// object URL after `grace_ms`.
fn download_script(filename: &str, media_type: &str, payload: &str, grace_ms: u128) -> String {
    format!(
        r#"const bin = atob({payload});
const bytes = new Uint8Array(bin.length);
for (let i = 0; i < bin.length; i++) bytes[i] = bin.charCodeAt(i);
const url = URL.createObjectURL(new Blob([bytes], {{ type: {media_type} }}));
const a = document.createElement('a');
a.href = url;
a.download = {filename};
document.body.appendChild(a);
a.click();
document.body.removeChild(a);
setTimeout(() => URL.revokeObjectURL(url), {grace_ms});
return true;"#,
        payload = json_string(payload),
        media_type = json_string(media_type),
        filename = json_string(filename),
    )
}

// ============================================================================
// DownloadSink
// ============================================================================

#[async_trait]
impl DownloadSink for Tab {
    async fn deliver(&self, filename: &str, media_type: &str, bytes: Vec<u8>) -> Result<Delivery> {
        let payload = Base64Standard.encode(&bytes);
        let script = download_script(
            filename,
            media_type,
            &payload,
            self.inner.download_grace.as_millis(),
        );

        self.execute_script(&script).await?;
        debug!(tab_id = %self.inner.tab_id, filename, bytes = bytes.len(), "Browser download triggered");

        Ok(Delivery {
            filename: filename.to_string(),
            path: None,
            bytes: bytes.len(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::download_script;

    #[test]
    fn test_download_script() {
        let script = download_script("Deck.pdf", "application/pdf", "JVBERi0=", 10_000);
        assert!(script.contains(r#"atob("JVBERi0=")"#));
        assert!(script.contains(r#"a.download = "Deck.pdf";"#));
        assert!(script.contains("URL.revokeObjectURL(url), 10000"));
    }
}
