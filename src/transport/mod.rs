//! WebSocket transport layer.
//!
//! This module handles communication between the capture engine and the
//! bridge extension via WebSocket.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Engine (Rust)  │                              │  Bridge         │
//! │                 │         WebSocket            │  extension      │
//! │  PendingServer  │◄────────────────────────────►│                 │
//! │  → Connection   │      localhost:PORT          │  WebSocket      │
//! │                 │                              │  client         │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `PendingServer::bind` - Bind to localhost
//! 2. Launch Firefox, or wait for an already-running bridge
//! 3. `PendingServer::accept` - Wait for the bridge to connect and send READY
//! 4. `Connection` - Send commands, receive responses
//! 5. `Connection::shutdown` - Close the socket
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection and event loop |
//! | `server` | WebSocket server binding and acceptance |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

/// WebSocket server for the bridge extension.
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, ReadyData};
pub use server::PendingServer;
