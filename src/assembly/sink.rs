//! Delivery targets.

// ============================================================================
// Imports
// ============================================================================

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{Error, Result};

use super::{Delivery, DownloadSink};

// ============================================================================
// Constants
// ============================================================================

/// Highest ` (n)` suffix tried before giving up.
const MAX_NAME_SUFFIX: u32 = 999;

// ============================================================================
// FileSink
// ============================================================================

/// Writes documents into a directory.
///
/// An existing file is never overwritten; the name gets a ` (n)` suffix
/// instead, the way browsers name repeated downloads.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn candidate(filename: &str, n: u32) -> String {
        if n == 0 {
            return filename.to_string();
        }
        match filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({n}).{ext}"),
            _ => format!("{filename} ({n})"),
        }
    }
}

#[async_trait]
impl DownloadSink for FileSink {
    async fn deliver(&self, filename: &str, _media_type: &str, bytes: Vec<u8>) -> Result<Delivery> {
        tokio::fs::create_dir_all(&self.dir).await?;

        for n in 0..=MAX_NAME_SUFFIX {
            let name = Self::candidate(filename, n);
            let path = self.dir.join(&name);

            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };
            file.write_all(&bytes).await?;
            file.flush().await?;

            debug!(path = %path.display(), bytes = bytes.len(), "Document written");
            return Ok(Delivery {
                filename: name,
                path: Some(path),
                bytes: bytes.len(),
            });
        }

        Err(Error::assembly(format!(
            "no free file name for {filename} in {}",
            self.dir.display()
        )))
    }
}

// ============================================================================
// Tests
// ============================================================================
