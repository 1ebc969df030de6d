//! Viewer DOM access over the bridge.
//!
//! Each [`ViewerPage`] primitive is one small script. Selectors are embedded
//! as JSON string literals.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::ScriptWorld;
use crate::viewer::{ChangeWatch, ImageState, PressOutcome, Rect, ViewerPage};

use super::Tab;
use super::script::json_string;

// ============================================================================
// Constants
// ============================================================================

/// Extra time granted to a press round trip beyond its ceiling.
const PRESS_MARGIN_MS: u64 = 5_000;

// ============================================================================
// Scripts
// ============================================================================

fn exists_script(selector: &str) -> String {
    format!("return document.querySelector({}) !== null;", json_string(selector))
}

fn text_script(selector: &str) -> String {
    format!(
        "const el = document.querySelector({});\n\
         return el ? (el.textContent || '').trim() : null;",
        json_string(selector)
    )
}

fn image_state_script(selector: &str) -> String {
    format!(
        "const img = document.querySelector({});\n\
         if (!img) return null;\n\
         return {{\n\
           src: img.getAttribute('src') || '',\n\
           complete: !!img.complete,\n\
           naturalWidth: img.naturalWidth || 0,\n\
           naturalHeight: img.naturalHeight || 0\n\
         }};",
        json_string(selector)
    )
}

fn bounding_rect_script(selector: &str) -> String {
    format!(
        "const el = document.querySelector({});\n\
         if (!el) return null;\n\
         const r = el.getBoundingClientRect();\n\
         return {{ x: r.x, y: r.y, width: r.width, height: r.height }};",
        json_string(selector)
    )
}

const DPR_SCRIPT: &str = "return window.devicePixelRatio || 1;";

/// Presses `control` and resolves once the page number changes or the
/// ceiling elapses. The viewer binds its handlers to `mouseup`, so both
/// halves of the press are dispatched.
fn press_script(control: &str, watch: &ChangeWatch) -> String {
    format!(
        r#"const button = document.querySelector({control});
if (!button) return {{ missing: {control} }};
const container = document.querySelector({container});
if (!container) return {{ missing: {container} }};
const read = () => {{
  const el = document.querySelector({page_number});
  return el ? (parseInt(el.textContent.trim(), 10) || 0) : 0;
}};
const before = read();
return new Promise(resolve => {{
  let observer = null;
  const timer = setTimeout(() => {{
    if (observer) observer.disconnect();
    resolve({{ changed: false }});
  }}, {ceiling});
  observer = new MutationObserver(() => {{
    if (read() !== before) {{
      clearTimeout(timer);
      observer.disconnect();
      resolve({{ changed: true }});
    }}
  }});
  observer.observe(container, {{ attributes: true, attributeFilter: ['class'], subtree: true }});
  button.dispatchEvent(new MouseEvent('mousedown', {{ bubbles: true, cancelable: true }}));
  button.dispatchEvent(new MouseEvent('mouseup', {{ bubbles: true, cancelable: true }}));
}});"#,
        control = json_string(control),
        container = json_string(&watch.container),
        page_number = json_string(&watch.page_number),
        ceiling = watch.ceiling.as_millis(),
    )
}

/// Fires the page's own jQuery `mouseup` handler on `control`.
fn trigger_script(control: &str) -> String {
    format!(
        "try {{ var $btn = jQuery({}); if ($btn.length) {{ $btn.trigger('mouseup'); }} }} catch (e) {{}}\n\
         return null;",
        json_string(control)
    )
}

// ============================================================================
// ViewerPage
// ============================================================================

#[async_trait]
impl ViewerPage for Tab {
    async fn location(&self) -> Result<String> {
        self.get_url().await
    }

    async fn exists(&self, selector: &str) -> Result<bool> {
        let value = self.execute_script(&exists_script(selector)).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn text(&self, selector: &str) -> Result<Option<String>> {
        let value = self.execute_script(&text_script(selector)).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn image_state(&self, selector: &str) -> Result<Option<ImageState>> {
        let value = self.execute_script(&image_state_script(selector)).await?;
        if value.is_null() {
            return Ok(None);
        }
        let state: ImageState = serde_json::from_value(value)?;
        trace!(selector, ?state, "Image state");
        Ok(Some(state))
    }

    async fn bounding_rect(&self, selector: &str) -> Result<Option<Rect>> {
        let value = self.execute_script(&bounding_rect_script(selector)).await?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    async fn device_pixel_ratio(&self) -> Result<f64> {
        let value = self.execute_script(DPR_SCRIPT).await?;
        Ok(value.as_f64().unwrap_or(1.0))
    }

    async fn press(&self, control: &str, watch: &ChangeWatch) -> Result<PressOutcome> {
        let timeout = watch.ceiling + std::time::Duration::from_millis(PRESS_MARGIN_MS);
        let value = self
            .execute_async_script(&press_script(control, watch), timeout)
            .await?;

        if let Some(missing) = value.get("missing").and_then(Value::as_str) {
            return Err(Error::structural(missing));
        }

        let outcome = if value.get("changed").and_then(Value::as_bool).unwrap_or(false) {
            PressOutcome::Changed
        } else {
            PressOutcome::Ceiling
        };
        debug!(tab_id = %self.inner.tab_id, control, ?outcome, "Press resolved");
        Ok(outcome)
    }

    async fn trigger_in_page(&self, control: &str) -> Result<()> {
        self.execute_script_in(&trigger_script(control), ScriptWorld::Main)
            .await?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
