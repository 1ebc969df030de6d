//! Browser-side handles.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Tab`] | The tab the bridge extension is attached to |
//!
//! # Example
//!
//! ```no_run
//! use std::net::{IpAddr, Ipv4Addr};
//! use deck_capture::{Tab, transport::PendingServer};
//!
//! # async fn example() -> deck_capture::Result<()> {
//! let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 9515).await?;
//! let (connection, ready) = server.accept().await?;
//! let tab = Tab::new(connection, ready);
//!
//! println!("Attached to {}", tab.get_url().await?);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Connected browser tab.
pub mod tab;

// ============================================================================
// Re-exports
// ============================================================================

pub use tab::Tab;
