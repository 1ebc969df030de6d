//! Core Tab struct and accessors.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::error::Result;
use crate::identifiers::{SessionId, TabId};
use crate::protocol::{Command, Request, Response};
use crate::transport::{Connection, ReadyData};

// ============================================================================
// Constants
// ============================================================================

/// Default per-command timeout.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Default delay before a download's object URL is revoked.
const DEFAULT_DOWNLOAD_GRACE: Duration = Duration::from_secs(10);

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for a tab.
pub(crate) struct TabInner {
    /// Tab ID.
    pub tab_id: TabId,
    /// Session ID from the READY handshake.
    pub session_id: Option<SessionId>,
    /// Bridge connection.
    pub connection: Connection,
    /// Timeout for ordinary commands.
    pub command_timeout: Duration,
    /// Object URL lifetime after a download starts.
    pub download_grace: Duration,
}

// ============================================================================
// Tab
// ============================================================================

/// A handle to the tab the bridge is attached to.
#[derive(Clone)]
pub struct Tab {
    pub(crate) inner: Arc<TabInner>,
}

impl fmt::Debug for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tab")
            .field("tab_id", &self.inner.tab_id)
            .field("session_id", &self.inner.session_id)
            .finish_non_exhaustive()
    }
}

impl Tab {
    /// Creates a tab handle from an accepted bridge connection.
    #[must_use]
    pub fn new(connection: Connection, ready: ReadyData) -> Self {
        Self::with_timeouts(connection, ready, DEFAULT_COMMAND_TIMEOUT, DEFAULT_DOWNLOAD_GRACE)
    }

    /// Creates a tab handle with explicit timeouts.
    #[must_use]
    pub fn with_timeouts(
        connection: Connection,
        ready: ReadyData,
        command_timeout: Duration,
        download_grace: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(TabInner {
                tab_id: ready.tab_id,
                session_id: ready.session_id,
                connection,
                command_timeout,
                download_grace,
            }),
        }
    }
}

// ============================================================================
// Tab - Accessors
// ============================================================================

impl Tab {
    /// Returns the tab ID.
    #[inline]
    #[must_use]
    pub fn tab_id(&self) -> TabId {
        self.inner.tab_id
    }

    /// Returns the session ID, if the bridge reported one.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.inner.session_id
    }

    /// Returns the bridge connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.inner.connection
    }

    /// Returns `true` while the bridge connection is alive.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_open()
    }
}

// ============================================================================
// Tab - Internal
// ============================================================================

impl Tab {
    /// Sends a command with the default timeout.
    ///
    /// Error responses are turned into errors.
    pub(crate) async fn send_command(&self, command: Command) -> Result<Response> {
        self.send_command_within(command, self.inner.command_timeout)
            .await
    }

    /// Sends a command with a custom timeout.
    pub(crate) async fn send_command_within(
        &self,
        command: Command,
        timeout: Duration,
    ) -> Result<Response> {
        let request = Request::new(self.inner.tab_id, command);
        trace!(tab_id = %self.inner.tab_id, request_id = %request.id, "Sending command");

        let response = self
            .inner
            .connection
            .send_with_timeout(request, timeout)
            .await?;

        if response.is_error() {
            return Err(response
                .into_result()
                .err()
                .unwrap_or_else(|| crate::Error::protocol("error response without error")));
        }
        Ok(response)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::Tab;

    #[test]
    fn test_tab_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<Tab>();
    }

    #[test]
    fn test_tab_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Tab>();
    }
}
