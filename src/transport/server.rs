//! Listening side of the page bridge.
//!
//! The crate binds first, the page loads the shim pointed at
//! [`BridgeServer::ws_url`], and the first socket to complete the READY
//! handshake becomes the [`ShimSession`]. One server serves one page.

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::link::{ShimLink, ShimSession};

// ============================================================================
// Constants
// ============================================================================

/// How long [`BridgeServer::accept`] waits for the shim to connect.
pub const ACCEPT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// BridgeServer
// ============================================================================

/// A bound listener waiting for the page shim.
///
/// # Example
///
/// ```no_run
/// use std::net::{IpAddr, Ipv4Addr};
/// use cantoo_embed::transport::BridgeServer;
///
/// # async fn example() -> cantoo_embed::Result<()> {
/// let server = BridgeServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
/// println!("point the shim at {}", server.ws_url());
///
/// let session = server.accept().await?;
/// println!("shim runs in {}", session.hello.page_url);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BridgeServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl BridgeServer {
    /// Binds to `ip:port`. Port 0 picks a free port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the address cannot be bound.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let addr = listener.local_addr()?;
        debug!(%addr, "Bridge server listening");
        Ok(Self { listener, addr })
    }

    /// Returns the bound address, with the real port when 0 was requested.
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the URL the shim must connect to.
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Waits for the shim, upgrades the socket and reads READY.
    ///
    /// # Errors
    ///
    /// - [`Error::BridgeTimeout`] if nothing connects within 30s, or READY
    ///   does not follow in time
    /// - [`Error::WebSocket`] if the upgrade fails
    /// - [`Error::Protocol`] if the first frame is not READY
    pub async fn accept(self) -> Result<ShimSession> {
        let (stream, peer) = timeout(ACCEPT_TIMEOUT, self.listener.accept())
            .await
            .map_err(|_| Error::bridge_timeout(ACCEPT_TIMEOUT.as_millis() as u64))??;

        let socket = tokio_tungstenite::accept_async(stream).await?;
        let session = ShimLink::handshake(socket).await?;

        info!(%peer, page_url = %session.hello.page_url, "Page shim connected");
        Ok(session)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::Ipv4Addr;

    use futures_util::SinkExt;
    use serde_json::json;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message;

    async fn localhost() -> BridgeServer {
        BridgeServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind should succeed")
    }

    #[tokio::test]
    async fn test_bind_reports_real_port() {
        let server = localhost().await;

        assert_ne!(server.local_addr().port(), 0);
        assert_eq!(
            server.ws_url(),
            format!("ws://127.0.0.1:{}", server.local_addr().port())
        );
    }

    #[tokio::test]
    async fn test_accept_reads_hello() {
        let server = localhost().await;
        let url = server.ws_url();

        let shim = tokio::spawn(async move {
            let (mut ws, _) = connect_async(url).await.expect("connect");
            let hello = json!({
                "id": "00000000-0000-0000-0000-000000000000",
                "type": "success",
                "result": { "pageUrl": "http://localhost/page.html" }
            });
            ws.send(Message::Text(hello.to_string().into()))
                .await
                .expect("send hello");
            ws
        });

        let session = server.accept().await.expect("accept");
        assert_eq!(session.hello.page_url, "http://localhost/page.html");
        assert_eq!(session.link.in_flight_count(), 0);

        drop(shim.await.expect("shim task"));
    }

    #[tokio::test]
    async fn test_accept_rejects_event_before_hello() {
        let server = localhost().await;
        let url = server.ws_url();

        let shim = tokio::spawn(async move {
            let (mut ws, _) = connect_async(url).await.expect("connect");
            let event = json!({ "type": "event", "method": "window.message", "params": {} });
            ws.send(Message::Text(event.to_string().into()))
                .await
                .expect("send event");
            ws
        });

        let result = server.accept().await;
        assert!(matches!(result, Err(Error::Protocol { .. })));

        drop(shim.await.expect("shim task"));
    }
}
