//! Host backed by a real page over the WebSocket bridge.
//!
//! The page runs a small shim that connects to a [`BridgeServer`], then
//! executes `frame.*` commands and forwards every window `message` event as
//! a `window.message` event, tagged with the `frameId` of the sending iframe
//! when it is one the shim mounted.
//!
//! # Example
//!
//! ```no_run
//! use std::net::{IpAddr, Ipv4Addr};
//! use cantoo_embed::Embed;
//! use cantoo_embed::host::BridgeHost;
//! use cantoo_embed::transport::BridgeServer;
//!
//! # async fn example() -> cantoo_embed::Result<()> {
//! let server = BridgeServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
//! tracing::info!(url = %server.ws_url(), "Waiting for the page shim");
//!
//! let host = BridgeHost::accept(server).await?;
//! let embed = Embed::builder().host(host).build()?;
//! # let _ = embed;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, trace};

use crate::error::{Error, Result};
use crate::identifiers::{ContainerId, FrameId, ListenerId};
use crate::protocol::{Command, FrameCommand, ParsedEvent};
use crate::transport::{BridgeServer, EventStream, ShimHello, ShimLink, ShimSession};

use super::{FrameAttributes, Host, InboundMessage, ListenerSet, MessageListener};

// ============================================================================
// Types
// ============================================================================

/// Result of `frame.mount`.
#[derive(Debug, Deserialize)]
struct Mounted {
    #[serde(rename = "frameId")]
    frame_id: FrameId,
}

// ============================================================================
// BridgeHost
// ============================================================================

/// A [`Host`] driving a real page through the bridge shim.
pub struct BridgeHost {
    /// Command side of the socket.
    link: ShimLink,
    /// READY data.
    hello: ShimHello,
    /// Window message listeners, fed by the event pump.
    listeners: Arc<ListenerSet>,
    /// Frames the shim confirmed detached.
    detached: Mutex<FxHashSet<FrameId>>,
}

impl fmt::Debug for BridgeHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeHost")
            .field("page_url", &self.hello.page_url)
            .field("listeners", &self.listeners.len())
            .field("link", &self.link)
            .finish_non_exhaustive()
    }
}

impl BridgeHost {
    /// Waits for the shim to connect to `server`.
    ///
    /// # Errors
    ///
    /// - [`Error::BridgeTimeout`] if the shim never connects or never sends READY
    /// - [`Error::WebSocket`] if the upgrade fails
    pub async fn accept(server: BridgeServer) -> Result<Self> {
        let session = server.accept().await?;
        info!(page_url = %session.hello.page_url, "Page bridge connected");
        Ok(Self::new(session))
    }

    /// Wraps an established shim session and starts forwarding its window
    /// messages to listeners.
    #[must_use]
    pub fn new(session: ShimSession) -> Self {
        let ShimSession {
            link,
            hello,
            events,
        } = session;
        let listeners = Arc::new(ListenerSet::default());

        tokio::spawn(pump_events(events, Arc::clone(&listeners)));

        Self {
            link,
            hello,
            listeners,
            detached: Mutex::new(FxHashSet::default()),
        }
    }

    /// Returns the URL of the page running the shim.
    #[inline]
    #[must_use]
    pub fn page_url(&self) -> &str {
        &self.hello.page_url
    }

    /// Closes the socket. Pending and later frame operations fail with
    /// [`Error::ConnectionClosed`].
    pub fn shutdown(&self) {
        self.link.close();
        debug!(page_url = %self.hello.page_url, "Page bridge shut down");
    }

    /// Sends a frame command and returns its result.
    async fn call(&self, command: FrameCommand) -> Result<Value> {
        self.link.call(Command::Frame(command)).await
    }
}

/// Forwards `window.message` events to every listener until the socket ends.
async fn pump_events(mut events: EventStream, listeners: Arc<ListenerSet>) {
    while let Some(event) = events.recv().await {
        match event.parse() {
            ParsedEvent::WindowMessage {
                origin,
                source,
                data,
            } => listeners.broadcast(&InboundMessage::new(origin, data).with_source(source)),
            ParsedEvent::Unknown { method, .. } => trace!(%method, "Ignoring bridge event"),
        }
    }
    debug!("Bridge event pump stopped");
}

// ============================================================================
// BridgeHost - Host
// ============================================================================

#[async_trait]
impl Host for BridgeHost {
    async fn mount_frame(
        &self,
        container: &ContainerId,
        src: &str,
        attributes: &FrameAttributes,
    ) -> Result<FrameId> {
        let result = self
            .call(FrameCommand::Mount {
                container_id: container.clone(),
                src: src.to_string(),
                allow: attributes.allow.clone(),
                style: attributes.style.clone(),
            })
            .await?;

        let Mounted { frame_id: id } = serde_json::from_value(result)
            .map_err(|e| Error::protocol(format!("frame.mount result: {e}")))?;

        debug!(frame_id = %id, %container, "Bridge frame mounted");
        Ok(id)
    }

    async fn navigate_frame(&self, frame: FrameId, src: &str) -> Result<()> {
        self.call(FrameCommand::Navigate {
            frame_id: frame,
            src: src.to_string(),
        })
        .await
        .map(drop)
    }

    async fn unmount_frame(&self, frame: FrameId) -> Result<()> {
        if self.detached.lock().contains(&frame) {
            return Ok(());
        }
        self.call(FrameCommand::Unmount { frame_id: frame }).await?;
        self.detached.lock().insert(frame);
        Ok(())
    }

    async fn post_message(
        &self,
        frame: FrameId,
        message: Value,
        target_origin: &str,
    ) -> Result<()> {
        self.call(FrameCommand::PostMessage {
            frame_id: frame,
            message,
            target_origin: target_origin.to_string(),
        })
        .await
        .map(drop)
    }

    fn add_message_listener(&self) -> MessageListener {
        self.listeners.add()
    }

    fn remove_message_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}
