//! WebSocket server the bridge extension connects to.
//!
//! # Connection Flow
//!
//! 1. Bind to `localhost:<port>` (0 for a random port)
//! 2. Either launch Firefox with the init page carrying the WebSocket URL,
//!    or let an already-running bridge connect to a fixed port
//! 3. The bridge connects and sends READY with its tab id
//! 4. Connection established, ready for commands

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::Connection;
use super::connection::ReadyData;

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for the bridge to connect.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// PendingServer
// ============================================================================

/// A WebSocket server that is bound but not yet connected.
///
/// Represents the state between binding to a port and accepting
/// the bridge's connection.
///
/// # Example
///
/// ```ignore
/// use std::net::{IpAddr, Ipv4Addr};
/// use deck_capture::transport::PendingServer;
///
/// let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
/// let ws_url = server.ws_url();
///
/// // Launch Firefox with ws_url, or point the bridge at it...
///
/// let (connection, ready_data) = server.accept().await?;
/// ```
pub struct PendingServer {
    /// TCP listener for incoming connections.
    listener: TcpListener,
    /// Port the server is bound to.
    port: u16,
}

impl PendingServer {
    /// Binds a WebSocket server to the specified address and port.
    ///
    /// Use port 0 to let the OS assign a random available port.
    ///
    /// # Arguments
    ///
    /// * `ip` - IP address to bind to (typically localhost)
    /// * `port` - Port to bind to (0 for random)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self> {
        let addr = SocketAddr::new(ip, port);
        let listener = TcpListener::bind(addr).await?;
        let actual_port = listener.local_addr()?.port();

        debug!(port = actual_port, "WebSocket server bound");

        Ok(Self {
            listener,
            port: actual_port,
        })
    }

    /// Returns the port the server is bound to.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the WebSocket URL for this server.
    ///
    /// Format: `ws://127.0.0.1:{port}`
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    /// Returns the local socket address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(std::net::Ipv4Addr::LOCALHOST), self.port)
    }

    /// Accepts a connection from the bridge and completes the handshake.
    ///
    /// Waits up to 30s. See [`accept_within`](Self::accept_within).
    ///
    /// # Errors
    ///
    /// Same as [`accept_within`](Self::accept_within).
    pub async fn accept(self) -> Result<(Connection, ReadyData)> {
        self.accept_within(CONNECTION_TIMEOUT).await
    }

    /// Accepts a connection with a custom connect timeout.
    ///
    /// This method:
    /// 1. Waits for TCP connection (with timeout)
    /// 2. Upgrades to WebSocket
    /// 3. Waits for READY handshake message
    ///
    /// # Returns
    ///
    /// Tuple of ([`Connection`], [`ReadyData`]) on success.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the bridge doesn't connect in time
    /// - [`Error::Connection`] if WebSocket upgrade fails
    /// - [`Error::Protocol`] if READY handshake fails
    pub async fn accept_within(self, connect_timeout: Duration) -> Result<(Connection, ReadyData)> {
        let accept_result = timeout(connect_timeout, self.listener.accept()).await;

        let (stream, addr) = accept_result
            .map_err(|_| Error::connection_timeout(connect_timeout.as_millis() as u64))??;

        debug!(?addr, "TCP connection accepted");

        let ws_stream = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;

        info!(port = self.port, "WebSocket connection established");

        let connection = Connection::new(ws_stream);
        let ready_data = connection.wait_ready().await?;

        Ok((connection, ready_data))
    }
}

// ============================================================================
// Tests
// ============================================================================
