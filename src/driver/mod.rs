//! Optional Firefox launcher.
//!
//! When the bridge is already running in the user's browser the capture
//! engine only needs a [`PendingServer`](crate::transport::PendingServer).
//! This module covers the other case: starting Firefox itself.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Launcher`] | Validated launch configuration |
//! | [`LauncherBuilder`] | Fluent configuration builder |
//! | [`Browser`] | Running Firefox with its connected tab |
//! | [`Profile`] | Temporary or existing profile directory |
//! | [`ExtensionSource`] | Unpacked or packed bridge extension |

// ============================================================================
// Submodules
// ============================================================================

/// Initial page carrying the WebSocket URL.
pub mod assets;

/// Fluent builder for launcher configuration.
pub mod builder;

/// Launcher and running browser.
pub mod core;

/// Firefox profile preparation.
pub mod profile;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::LauncherBuilder;
pub use core::{Browser, Launcher};
pub use profile::{ExtensionSource, PrefValue, Preference, Profile};
