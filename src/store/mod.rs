//! Durable key/value storage and capture progress records.
//!
//! | Item | Role |
//! |------|------|
//! | [`DurableStore`] | Async `get`/`set`/`remove` over string keys |
//! | [`MemoryStore`] | In-process store for tests and dry runs |
//! | [`FileStore`] | One file per key, atomic replace |
//! | [`ProgressStore`] | Session metadata and page records on top of a store |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// File-backed store.
pub mod file;

/// In-memory store.
pub mod memory;

/// Capture progress records.
pub mod progress;

// ============================================================================
// Re-exports
// ============================================================================

pub use file::FileStore;
pub use memory::MemoryStore;
pub use progress::{PersistedSession, ProgressStore, SessionSummary};

// ============================================================================
// DurableStore
// ============================================================================

/// Byte-valued key/value store that survives the capture run.
///
/// Values are opaque. A missing key is not an error.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Reads the value under `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Writes `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Deletes `key`. Deleting a missing key succeeds.
    async fn remove(&self, key: &str) -> Result<()>;
}
