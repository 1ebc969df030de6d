//! Builder pattern for launcher configuration.
//!
//! ```no_run
//! use deck_capture::driver::Launcher;
//!
//! # fn example() -> deck_capture::Result<()> {
//! let launcher = Launcher::builder()
//!     .binary("/usr/bin/firefox")
//!     .extension("./bridge")
//!     .profile("~/.mozilla/firefox/capture")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

use super::core::Launcher;
use super::profile::ExtensionSource;

// ============================================================================
// Constants
// ============================================================================

/// How long Firefox gets to start and connect the bridge.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// LauncherBuilder
// ============================================================================

/// Builder for a [`Launcher`].
///
/// Use [`Launcher::builder()`] to create one.
#[derive(Debug, Clone)]
pub struct LauncherBuilder {
    binary: Option<PathBuf>,
    extension: Option<ExtensionSource>,
    profile: Option<PathBuf>,
    headless: bool,
    window_size: Option<(u32, u32)>,
    connect_timeout: Duration,
}

impl Default for LauncherBuilder {
    fn default() -> Self {
        Self {
            binary: None,
            extension: None,
            profile: None,
            headless: false,
            window_size: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl LauncherBuilder {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the Firefox executable.
    #[inline]
    #[must_use]
    pub fn binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = Some(path.into());
        self
    }

    /// Sets the bridge extension; directories are unpacked sources, files
    /// are archives.
    #[inline]
    #[must_use]
    pub fn extension(mut self, path: impl Into<PathBuf>) -> Self {
        self.extension = Some(ExtensionSource::from(path.into()));
        self
    }

    #[inline]
    #[must_use]
    pub fn extension_source(mut self, source: ExtensionSource) -> Self {
        self.extension = Some(source);
        self
    }

    /// Uses an existing profile instead of a temporary one.
    #[inline]
    #[must_use]
    pub fn profile(mut self, path: impl Into<PathBuf>) -> Self {
        self.profile = Some(path.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn headless(mut self) -> Self {
        self.headless = true;
        self
    }

    #[inline]
    #[must_use]
    pub fn window_size(mut self, width: u32, height: u32) -> Self {
        self.window_size = Some((width, height));
        self
    }

    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the binary or extension is not set, or the
    ///   extension path does not exist
    /// - [`Error::BrowserNotFound`] if the binary path does not exist
    pub fn build(self) -> Result<Launcher> {
        let binary = self.binary.ok_or_else(|| {
            Error::config("Firefox binary path is required. Use .binary() to set it.")
        })?;
        if !binary.exists() {
            return Err(Error::browser_not_found(binary));
        }

        let extension = self.extension.ok_or_else(|| {
            Error::config("Bridge extension is required. Use .extension() to set it.")
        })?;
        if !extension.path().exists() {
            return Err(Error::config(format!(
                "Extension not found at: {}",
                extension.path().display()
            )));
        }

        let mut args = Vec::new();
        if self.headless {
            args.push("--headless".to_string());
        }
        if let Some((width, height)) = self.window_size {
            args.push("--width".to_string());
            args.push(width.to_string());
            args.push("--height".to_string());
            args.push(height.to_string());
        }

        Ok(Launcher::new(
            binary,
            extension,
            self.profile,
            args,
            self.connect_timeout,
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_fails_without_binary() {
        let err = LauncherBuilder::new().extension("./bridge").build().unwrap_err();
        assert!(err.to_string().contains("binary"));
    }

    #[test]
    fn test_build_fails_with_missing_binary() {
        let err = LauncherBuilder::new()
            .binary("/nonexistent/firefox")
            .extension("./bridge")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::BrowserNotFound { .. }));
    }

    #[test]
    fn test_build_fails_without_extension() {
        let binary = tempfile::NamedTempFile::new().expect("temp file");
        let err = LauncherBuilder::new().binary(binary.path()).build().unwrap_err();
        assert!(err.to_string().contains("extension"));
    }

    #[test]
    fn test_build_collects_args() {
        let binary = tempfile::NamedTempFile::new().expect("temp file");
        let bridge = tempfile::tempdir().expect("temp dir");

        let launcher = LauncherBuilder::new()
            .binary(binary.path())
            .extension(bridge.path())
            .headless()
            .window_size(1600, 1000)
            .build()
            .expect("build");

        assert_eq!(
            launcher.args(),
            ["--headless", "--width", "1600", "--height", "1000"]
        );
        assert!(launcher.extension().is_unpacked());
    }
}
