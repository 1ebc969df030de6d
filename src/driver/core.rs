//! Firefox launcher.
//!
//! [`Launcher::launch`] prepares a profile, binds the bridge server, starts
//! Firefox on the init page and waits for the bridge to report READY.
//!
//! ```no_run
//! use deck_capture::driver::Launcher;
//!
//! # async fn example() -> deck_capture::Result<()> {
//! let browser = Launcher::builder()
//!     .binary("/usr/bin/firefox")
//!     .extension("./bridge")
//!     .build()?
//!     .launch()
//!     .await?;
//!
//! let url = browser.tab().get_url().await?;
//! browser.close().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::browser::Tab;
use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::transport::PendingServer;

use super::assets;
use super::builder::LauncherBuilder;
use super::profile::{ExtensionSource, Profile};

// ============================================================================
// Launcher
// ============================================================================

/// Validated launch configuration.
#[derive(Debug, Clone)]
pub struct Launcher {
    binary: PathBuf,
    extension: ExtensionSource,
    profile: Option<PathBuf>,
    args: Vec<String>,
    connect_timeout: Duration,
}

impl Launcher {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> LauncherBuilder {
        LauncherBuilder::new()
    }

    pub(crate) fn new(
        binary: PathBuf,
        extension: ExtensionSource,
        profile: Option<PathBuf>,
        args: Vec<String>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            binary,
            extension,
            profile,
            args,
            connect_timeout,
        }
    }

    #[inline]
    #[must_use]
    pub fn binary(&self) -> &PathBuf {
        &self.binary
    }

    #[inline]
    #[must_use]
    pub fn extension(&self) -> &ExtensionSource {
        &self.extension
    }

    /// Extra command-line arguments passed to Firefox.
    #[inline]
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Starts Firefox and waits for the bridge to connect.
    ///
    /// # Errors
    ///
    /// - [`Error::Profile`] if the profile cannot be prepared
    /// - [`Error::ProcessLaunchFailed`] if Firefox cannot be started
    /// - [`Error::ConnectionTimeout`] if the bridge never connects
    pub async fn launch(&self) -> Result<Browser> {
        let profile = match &self.profile {
            Some(path) => Profile::from_path(path)?,
            None => Profile::new_temp()?,
        };
        profile.install_extension(&self.extension)?;
        profile.write_prefs(&Profile::default_prefs())?;

        let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
        let session_id = SessionId::next();
        let init_page = assets::build_init_data_uri(&server.ws_url(), session_id);

        let mut cmd = Command::new(&self.binary);
        cmd.arg("--profile")
            .arg(profile.path())
            .arg("--no-remote")
            .arg("--new-instance")
            .args(&self.args)
            .arg(init_page)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(Error::process_launch_failed)?;
        info!(pid = child.id(), session_id = %session_id, port = server.port(), "Firefox started");

        let (connection, ready) = server.accept_within(self.connect_timeout).await?;
        match ready.session_id {
            Some(reported) if reported != session_id => {
                warn!(expected = %session_id, %reported, "Bridge reported a different session");
            }
            _ => {}
        }

        let tab = Tab::new(connection, ready);
        debug!(?tab, "Bridge connected");

        Ok(Browser {
            tab,
            child,
            profile,
        })
    }
}

// ============================================================================
// Browser
// ============================================================================

/// A running Firefox with its connected tab.
///
/// The process is killed when this is dropped; a temporary profile is
/// removed with it.
pub struct Browser {
    tab: Tab,
    child: Child,
    profile: Profile,
}

impl fmt::Debug for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Browser")
            .field("pid", &self.child.id())
            .field("profile", &self.profile.path())
            .field("tab", &self.tab)
            .finish()
    }
}

impl Browser {
    #[inline]
    #[must_use]
    pub fn tab(&self) -> &Tab {
        &self.tab
    }

    #[inline]
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Disconnects the bridge and stops Firefox.
    pub async fn close(mut self) {
        self.tab.connection().shutdown();
        if let Err(e) = self.child.kill().await {
            debug!(error = %e, "Firefox already exited");
        }
        info!(profile = %self.profile.path().display(), "Firefox closed");
    }
}

// ============================================================================
// Tests
// ============================================================================
