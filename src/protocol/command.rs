//! Command definitions organized by module.
//!
//! Commands follow `module.methodName` format.
//!
//! # Command Modules
//!
//! | Module | Commands |
//! |--------|----------|
//! | `browsingContext` | URL, reload, viewport screenshot |
//! | `script` | JavaScript execution in the isolated or page world |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Command Wrapper
// ============================================================================

/// All protocol commands organized by module.
///
/// This enum wraps module-specific command enums for unified serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    /// BrowsingContext module commands.
    BrowsingContext(BrowsingContextCommand),
    /// Script module commands.
    Script(ScriptCommand),
}

// ============================================================================
// BrowsingContext Commands
// ============================================================================

/// BrowsingContext module commands for the connected tab.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum BrowsingContextCommand {
    /// Get current URL.
    #[serde(rename = "browsingContext.getUrl")]
    GetUrl,

    /// Reload current page.
    #[serde(rename = "browsingContext.reload")]
    Reload,

    /// Capture the visible viewport.
    #[serde(rename = "browsingContext.captureScreenshot")]
    CaptureScreenshot {
        /// Image format, `png` or `jpeg`.
        format: String,
        /// JPEG quality (0-100), ignored for PNG.
        #[serde(skip_serializing_if = "Option::is_none")]
        quality: Option<u8>,
    },
}

// ============================================================================
// Script Commands
// ============================================================================

/// Script execution world.
///
/// The isolated world sees the DOM but not page globals; the main world is
/// the page's own script context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptWorld {
    /// Content-script world of the bridge extension.
    #[default]
    Isolated,
    /// Page's own world, with its globals and libraries.
    Main,
}

/// Script module commands for JavaScript execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum ScriptCommand {
    /// Execute synchronous script.
    #[serde(rename = "script.evaluate")]
    Evaluate {
        /// JavaScript code.
        script: String,
        /// Script arguments.
        #[serde(default)]
        args: Vec<Value>,
        /// Execution world.
        #[serde(default)]
        world: ScriptWorld,
    },

    /// Execute async script, resolving the returned promise.
    #[serde(rename = "script.evaluateAsync")]
    EvaluateAsync {
        /// JavaScript code.
        script: String,
        /// Script arguments.
        #[serde(default)]
        args: Vec<Value>,
        /// Execution world.
        #[serde(default)]
        world: ScriptWorld,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_screenshot_png() {
        let cmd = BrowsingContextCommand::CaptureScreenshot {
            format: "png".to_string(),
            quality: None,
        };
        let json = serde_json::to_string(&cmd).expect("serialize");
        assert!(json.contains("browsingContext.captureScreenshot"));
        assert!(!json.contains("quality"));
    }

    #[test]
    fn test_unit_command_method() {
        let json = serde_json::to_value(Command::BrowsingContext(BrowsingContextCommand::GetUrl))
            .expect("serialize");
        assert_eq!(json["method"], "browsingContext.getUrl");
    }

    #[test]
    fn test_script_world_serialization() {
        let cmd = ScriptCommand::Evaluate {
            script: "return 1".to_string(),
            args: vec![],
            world: ScriptWorld::Main,
        };
        let json = serde_json::to_value(&cmd).expect("serialize");
        assert_eq!(json["method"], "script.evaluate");
        assert_eq!(json["params"]["world"], "main");
    }

    #[test]
    fn test_script_world_defaults_to_isolated() {
        let cmd: ScriptCommand = serde_json::from_str(
            r#"{"method":"script.evaluateAsync","params":{"script":"return 1"}}"#,
        )
        .expect("parse");
        let ScriptCommand::EvaluateAsync { world, .. } = cmd else {
            panic!("expected evaluateAsync");
        };
        assert_eq!(world, ScriptWorld::Isolated);
    }
}
