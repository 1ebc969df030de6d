//! Initial page handed to a launched Firefox.
//!
//! The bridge's content script listens on the first page for a
//! `BRIDGE_INIT` message carrying the WebSocket URL, validates that it points
//! at localhost, and hands it to the background script, which connects and
//! sends READY.

use serde_json::json;

use crate::identifiers::SessionId;

/// Builds the `data:text/html,...` URI Firefox opens on startup.
#[must_use]
pub fn build_init_data_uri(ws_url: &str, session_id: SessionId) -> String {
    let message = json!({
        "type": "BRIDGE_INIT",
        "wsUrl": ws_url,
        "sessionId": session_id.as_u32(),
    });

    let html = INIT_HTML
        .replace("$WS_URL", ws_url)
        .replace("$MESSAGE", &message.to_string());

    format!("data:text/html,{}", urlencoding::encode(&html))
}

const INIT_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<title>deck-capture</title>
<style>body { font: 14px monospace; padding: 32px; color: #333; }</style>
</head>
<body>
<p>Connecting bridge to <code>$WS_URL</code>...</p>
<p>Open the presentation in this tab once connected.</p>
<script>window.postMessage($MESSAGE, '*');</script>
</body>
</html>"#;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_uri_is_encoded_html() {
        let session_id = SessionId::next();
        let uri = build_init_data_uri("ws://127.0.0.1:4567", session_id);

        assert!(uri.starts_with("data:text/html,"));
        assert!(!uri.contains('<'));

        let html = urlencoding::decode(&uri["data:text/html,".len()..]).expect("decode");
        assert!(html.contains("\"type\":\"BRIDGE_INIT\""));
        assert!(html.contains("\"wsUrl\":\"ws://127.0.0.1:4567\""));
        assert!(html.contains(&format!("\"sessionId\":{}", session_id.as_u32())));
    }
}
