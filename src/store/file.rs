//! File-backed store.
//!
//! Each key maps to one file `<dir>/<percent-encoded key>.rec`. Writes go to
//! a temporary file in the same directory that is then renamed over the
//! target, so a reader sees either the old or the new value.

// ============================================================================
// Imports
// ============================================================================

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::trace;

use crate::error::{Error, Result};

use super::DurableStore;

// ============================================================================
// Constants
// ============================================================================

const RECORD_EXTENSION: &str = "rec";

// ============================================================================
// FileStore
// ============================================================================

/// Store persisting one file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{RECORD_EXTENSION}", urlencoding::encode(key)))
    }

    fn check_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(Error::storage(key, "empty key"));
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Self::check_key(key)?;
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage(key, e.to_string())),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        Self::check_key(key)?;
        let dir = self.dir.clone();
        let target = self.path_for(key);
        let len = value.len();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = NamedTempFile::new_in(&dir)?;
            tmp.write_all(&value)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| Error::storage(key, format!("writer task failed: {e}")))?
        .map_err(|e| Error::storage(key, e.to_string()))?;

        trace!(key, bytes = len, "Record written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        Self::check_key(key)?;
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage(key, e.to_string())),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
