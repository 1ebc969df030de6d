//! Firefox profile preparation.
//!
//! A capture run can use a throwaway profile, or an existing one so that a
//! session already signed in to the viewer is reused. Either way the launcher
//! writes automation preferences to `user.js` and drops the bridge extension
//! into `extensions/`.
//!
//! # Example
//!
//! ```no_run
//! use deck_capture::driver::{ExtensionSource, Profile};
//!
//! # fn example() -> deck_capture::Result<()> {
//! let profile = Profile::new_temp()?;
//! profile.write_prefs(&Profile::default_prefs())?;
//! profile.install_extension(&ExtensionSource::unpacked("./bridge"))?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::TempDir;
use tracing::debug;
use zip::ZipArchive;

use crate::error::{Error, Result};

// ============================================================================
// Submodules
// ============================================================================

/// Bridge extension source.
pub mod extensions;

/// `user.js` preference lines.
pub mod preferences;

// ============================================================================
// Re-exports
// ============================================================================

pub use extensions::ExtensionSource;
pub use preferences::{PrefValue, Preference};

// ============================================================================
// Constants
// ============================================================================

const USER_JS_HEADER: &str = "// deck-capture user.js\n\n";

const MANIFEST: &str = "manifest.json";

// ============================================================================
// Profile
// ============================================================================

/// A Firefox profile directory.
///
/// Temporary profiles are deleted when dropped; profiles opened with
/// [`Profile::from_path`] are left in place.
pub struct Profile {
    _temp_dir: Option<TempDir>,
    path: PathBuf,
}

impl Profile {
    /// Creates a temporary profile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Profile`] if the directory cannot be created.
    pub fn new_temp() -> Result<Self> {
        let temp_dir = TempDir::with_prefix("deck-capture-")
            .map_err(|e| Error::profile(format!("Failed to create temp profile: {e}")))?;
        let path = temp_dir.path().to_path_buf();
        debug!(path = %path.display(), "Created temporary profile");

        Ok(Self {
            _temp_dir: Some(temp_dir),
            path,
        })
    }

    /// Opens an existing profile directory, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Profile`] if the directory cannot be created.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        fs::create_dir_all(&path).map_err(|e| {
            Error::profile(format!(
                "Failed to create profile directory at {}: {e}",
                path.display()
            ))
        })?;
        debug!(path = %path.display(), "Using profile directory");

        Ok(Self {
            _temp_dir: None,
            path,
        })
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if the profile is removed on drop.
    #[inline]
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self._temp_dir.is_some()
    }

    fn extensions_dir(&self) -> Result<PathBuf> {
        let dir = self.path.join("extensions");
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

// ============================================================================
// Profile - Preferences
// ============================================================================

impl Profile {
    /// Writes `prefs` to `user.js`, replacing any previous file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Profile`] if the file cannot be written.
    pub fn write_prefs(&self, prefs: &[Preference]) -> Result<()> {
        let file_path = self.path.join("user.js");

        let mut content = String::from(USER_JS_HEADER);
        for pref in prefs {
            content.push_str(&pref.line());
            content.push('\n');
        }

        fs::write(&file_path, content).map_err(|e| {
            Error::profile(format!(
                "Failed to write user.js at {}: {e}",
                file_path.display()
            ))
        })?;

        debug!(path = %file_path.display(), pref_count = prefs.len(), "Wrote user.js");
        Ok(())
    }

    /// Preferences for an unattended capture run.
    #[must_use]
    pub fn default_prefs() -> Vec<Preference> {
        vec![
            // Bridge extension
            Preference::new("xpinstall.signatures.required", false)
                .note("Allow the unsigned bridge extension"),
            Preference::new("extensions.autoDisableScopes", 0),
            Preference::new("extensions.webextensions.restrictedDomains", ""),
            Preference::new("security.data_uri.block_toplevel_data_uri_navigations", false)
                .note("The init page is a data URI"),
            // Startup
            Preference::new("browser.startup.page", 0),
            Preference::new("browser.shell.checkDefaultBrowser", false),
            Preference::new("browser.startup.homepage_override.mstone", "ignore"),
            Preference::new("browser.sessionstore.resume_from_crash", false),
            Preference::new("browser.aboutConfig.showWarning", false),
            Preference::new("browser.uitour.enabled", false),
            Preference::new("startup.homepage_welcome_url", ""),
            Preference::new("browser.tabs.warnOnClose", false),
            Preference::new("browser.warnOnQuit", false),
            // Downloads
            Preference::new("browser.download.useDownloadDir", true)
                .note("Save finished documents without a dialog"),
            Preference::new("browser.download.always_ask_before_handling_new_types", false),
            Preference::new("browser.download.panel.shown", true),
            Preference::new("pdfjs.disabled", true),
            // Background noise
            Preference::new("toolkit.telemetry.enabled", false),
            Preference::new("toolkit.telemetry.unified", false),
            Preference::new("datareporting.policy.dataSubmissionEnabled", false),
            Preference::new("datareporting.healthreport.uploadEnabled", false),
            Preference::new("app.update.service.enabled", false),
            Preference::new("app.normandy.enabled", false),
            Preference::new("extensions.update.enabled", false),
            // Keep slides rendering while the window is in the background
            Preference::new("dom.min_background_timeout_value", 4),
            Preference::new("widget.windows.window_occlusion_tracking.enabled", false),
        ]
    }
}

// ============================================================================
// Profile - Extensions
// ============================================================================

impl Profile {
    /// Installs the bridge extension.
    ///
    /// Unpacked directories are copied to `extensions/<id>/`; archives are
    /// copied to `extensions/<id>.xpi`. The id is read from the manifest's
    /// `browser_specific_settings.gecko.id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Profile`] if the manifest is missing or has no id,
    /// or [`Error::Io`] if copying fails.
    pub fn install_extension(&self, source: &ExtensionSource) -> Result<()> {
        match source {
            ExtensionSource::Unpacked(src) => {
                let manifest = fs::read_to_string(src.join(MANIFEST)).map_err(|e| {
                    Error::profile(format!(
                        "Extension manifest not found in {}: {e}",
                        src.display()
                    ))
                })?;
                let id = manifest_id(&manifest)?;
                let dest = self.extensions_dir()?.join(&id);
                copy_dir_recursive(src, &dest)?;
                debug!(extension_id = %id, dest = %dest.display(), "Installed unpacked extension");
            }
            ExtensionSource::Packed(src) => {
                let manifest = read_archive_manifest(src)?;
                let id = manifest_id(&manifest)?;
                let dest = self.extensions_dir()?.join(format!("{id}.xpi"));
                fs::copy(src, &dest)?;
                debug!(extension_id = %id, dest = %dest.display(), "Installed packed extension");
            }
        }
        Ok(())
    }
}

// ============================================================================
// Private Helpers
// ============================================================================

fn read_archive_manifest(archive_path: &Path) -> Result<String> {
    let file = fs::File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| Error::profile(format!("Invalid extension archive: {e}")))?;
    let mut entry = archive
        .by_name(MANIFEST)
        .map_err(|e| Error::profile(format!("Extension archive has no manifest: {e}")))?;

    let mut manifest = String::new();
    entry.read_to_string(&mut manifest)?;
    Ok(manifest)
}

fn manifest_id(manifest: &str) -> Result<String> {
    let json: Value = serde_json::from_str(manifest)
        .map_err(|e| Error::profile(format!("Invalid manifest.json: {e}")))?;

    ["/browser_specific_settings/gecko/id", "/applications/gecko/id"]
        .iter()
        .find_map(|pointer| json.pointer(pointer).and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| Error::profile("Extension manifest missing 'gecko.id' field"))
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    const MANIFEST_JSON: &str =
        r#"{"manifest_version": 2, "browser_specific_settings": {"gecko": {"id": "bridge@deck-capture"}}}"#;

    #[test]
    fn test_temp_profile_cleanup_on_drop() {
        let path = {
            let profile = Profile::new_temp().expect("create temp profile");
            assert!(profile.is_temporary());
            profile.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_from_path_creates_directory() {
        let temp = tempfile::tempdir().expect("temp dir");
        let profile_path = temp.path().join("profile");

        let profile = Profile::from_path(&profile_path).expect("create profile");
        assert!(profile.path().is_dir());
        assert!(!profile.is_temporary());
    }

    #[test]
    fn test_write_prefs() {
        let profile = Profile::new_temp().expect("create temp profile");
        profile.write_prefs(&Profile::default_prefs()).expect("write");

        let content = fs::read_to_string(profile.path().join("user.js")).expect("read");
        assert!(content.starts_with(USER_JS_HEADER));
        assert!(content.contains("user_pref(\"xpinstall.signatures.required\", false);"));
    }

    #[test]
    fn test_manifest_id_locations() {
        assert_eq!(manifest_id(MANIFEST_JSON).expect("id"), "bridge@deck-capture");
        assert_eq!(
            manifest_id(r#"{"applications": {"gecko": {"id": "old@ext"}}}"#).expect("id"),
            "old@ext"
        );
        assert!(manifest_id("{}").is_err());
        assert!(manifest_id("not json").is_err());
    }

    #[test]
    fn test_install_unpacked() {
        let src = tempfile::tempdir().expect("temp dir");
        fs::write(src.path().join(MANIFEST), MANIFEST_JSON).expect("manifest");
        fs::create_dir(src.path().join("content")).expect("subdir");
        fs::write(src.path().join("content/bridge.js"), "// bridge").expect("script");

        let profile = Profile::new_temp().expect("profile");
        profile
            .install_extension(&ExtensionSource::unpacked(src.path()))
            .expect("install");

        let installed = profile.path().join("extensions/bridge@deck-capture");
        assert!(installed.join(MANIFEST).is_file());
        assert!(installed.join("content/bridge.js").is_file());
    }

    #[test]
    fn test_install_packed() {
        let dir = tempfile::tempdir().expect("temp dir");
        let xpi = dir.path().join("bridge.xpi");
        {
            let file = fs::File::create(&xpi).expect("create xpi");
            let mut writer = zip::ZipWriter::new(file);
            writer
                .start_file(MANIFEST, zip::write::SimpleFileOptions::default())
                .expect("start file");
            writer.write_all(MANIFEST_JSON.as_bytes()).expect("write");
            writer.finish().expect("finish");
        }

        let profile = Profile::new_temp().expect("profile");
        profile
            .install_extension(&ExtensionSource::packed(&xpi))
            .expect("install");

        assert!(profile.path().join("extensions/bridge@deck-capture.xpi").is_file());
    }

    #[test]
    fn test_install_without_manifest_fails() {
        let src = tempfile::tempdir().expect("temp dir");
        let profile = Profile::new_temp().expect("profile");
        let err = profile
            .install_extension(&ExtensionSource::unpacked(src.path()))
            .unwrap_err();
        assert!(matches!(err, Error::Profile { .. }));
    }
}
