//! Bridge extension source.
//!
//! | Format | Description |
//! |--------|-------------|
//! | Unpacked | Directory containing `manifest.json` |
//! | Packed | `.xpi` or `.zip` archive |

// ============================================================================
// Imports
// ============================================================================

use std::path::{Path, PathBuf};

// ============================================================================
// ExtensionSource
// ============================================================================

/// Where the bridge extension is read from.
///
/// # Examples
///
/// ```
/// use deck_capture::driver::ExtensionSource;
///
/// let unpacked = ExtensionSource::unpacked("./bridge");
/// assert!(unpacked.is_unpacked());
///
/// let packed = ExtensionSource::from(std::path::PathBuf::from("./bridge.xpi"));
/// assert!(packed.is_packed());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExtensionSource {
    /// Path to an unpacked extension directory.
    Unpacked(PathBuf),

    /// Path to a packed extension archive (.xpi or .zip).
    Packed(PathBuf),
}

impl ExtensionSource {
    /// Creates an unpacked extension source.
    #[inline]
    #[must_use]
    pub fn unpacked(path: impl Into<PathBuf>) -> Self {
        Self::Unpacked(path.into())
    }

    /// Creates a packed extension source.
    #[inline]
    #[must_use]
    pub fn packed(path: impl Into<PathBuf>) -> Self {
        Self::Packed(path.into())
    }

    /// Returns the path on disk.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Unpacked(path) | Self::Packed(path) => path,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_unpacked(&self) -> bool {
        matches!(self, Self::Unpacked(_))
    }

    #[inline]
    #[must_use]
    pub fn is_packed(&self) -> bool {
        matches!(self, Self::Packed(_))
    }
}

/// Directories are unpacked sources; anything else is treated as an archive.
impl From<PathBuf> for ExtensionSource {
    fn from(path: PathBuf) -> Self {
        if path.is_dir() {
            Self::Unpacked(path)
        } else {
            Self::Packed(path)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
