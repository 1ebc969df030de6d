//! WebSocket protocol message types.
//!
//! This module defines the message format for communication between
//! the capture engine (server) and the bridge extension (client).
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Engine → Bridge | Command request |
//! | `Response` | Bridge → Engine | Command response, or the READY handshake |
//!
//! # Command Naming
//!
//! Commands follow `module.methodName` format:
//!
//! - `browsingContext.captureScreenshot`
//! - `script.evaluateAsync`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Command definitions by domain |
//! | `request` | Request and Response types |

// ============================================================================
// Submodules
// ============================================================================

/// Command definitions organized by module.
pub mod command;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{BrowsingContextCommand, Command, ScriptCommand, ScriptWorld};
pub use request::{Request, Response, ResponseType};
