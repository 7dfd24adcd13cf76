//! Host page abstraction.
//!
//! The embed protocol never touches a DOM directly. Everything it needs from
//! the page (mounting an iframe, reassigning its `src`, detaching it,
//! posting into it, and listening on the window message channel) goes
//! through the [`Host`] trait.
//!
//! # Implementations
//!
//! | Host | Backing |
//! |------|---------|
//! | [`MemoryHost`] | In-process page model (tests, headless use) |
//! | [`BridgeHost`] | Real page driven over a local WebSocket |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::Result;
use crate::identifiers::{ContainerId, FrameId, ListenerId};

// ============================================================================
// Submodules
// ============================================================================

/// Page bridge host over WebSocket.
pub mod bridge;

/// In-memory page model.
pub mod memory;

// ============================================================================
// Re-exports
// ============================================================================

pub use bridge::BridgeHost;
pub use memory::MemoryHost;

// ============================================================================
// Types
// ============================================================================

/// A `message` event observed on the host window.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Origin of the sending document.
    pub origin: String,
    /// Iframe whose window sent the message, when the host can tell.
    ///
    /// `None` means the sender is not one of the host's iframes (or the
    /// host cannot resolve it); such messages are filtered by origin only.
    pub source: Option<FrameId>,
    /// Message data.
    pub data: Value,
}

impl InboundMessage {
    /// Creates an inbound message with no known source frame.
    #[inline]
    #[must_use]
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            source: None,
            data,
        }
    }

    /// Sets the iframe that sent the message.
    #[inline]
    #[must_use]
    pub fn with_source(mut self, source: Option<FrameId>) -> Self {
        self.source = source;
        self
    }
}

/// Attributes applied to the iframe at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameAttributes {
    /// Permission policy (`allow` attribute).
    pub allow: String,
    /// Inline CSS.
    pub style: String,
}

/// A registered window message listener.
///
/// Messages arrive on `receiver` in host delivery order. The channel closes
/// once the listener is removed.
#[derive(Debug)]
pub struct MessageListener {
    /// Registration handle, used to remove the listener.
    pub id: ListenerId,
    /// Delivered messages.
    pub receiver: mpsc::UnboundedReceiver<InboundMessage>,
}

// ============================================================================
// Host
// ============================================================================

/// Operations the embed needs from the host page.
#[async_trait]
pub trait Host: Send + Sync + 'static {
    /// Creates an iframe with `src` and `attributes` and appends it to
    /// `container`.
    async fn mount_frame(
        &self,
        container: &ContainerId,
        src: &str,
        attributes: &FrameAttributes,
    ) -> Result<FrameId>;

    /// Reassigns the iframe's `src`, reloading its document.
    async fn navigate_frame(&self, frame: FrameId, src: &str) -> Result<()>;

    /// Detaches the iframe. Detaching an already detached frame succeeds.
    async fn unmount_frame(&self, frame: FrameId) -> Result<()>;

    /// Posts `message` into the iframe's content window.
    async fn post_message(&self, frame: FrameId, message: Value, target_origin: &str)
    -> Result<()>;

    /// Registers a listener on the window message channel.
    fn add_message_listener(&self) -> MessageListener;

    /// Removes a listener. Returns `false` if it was not registered.
    fn remove_message_listener(&self, id: ListenerId) -> bool;
}

// ============================================================================
// ListenerSet
// ============================================================================

/// Fan-out table of window message listeners shared by host implementations.
#[derive(Default)]
pub(crate) struct ListenerSet {
    senders: Mutex<FxHashMap<ListenerId, mpsc::UnboundedSender<InboundMessage>>>,
}

impl ListenerSet {
    /// Registers a new listener.
    pub(crate) fn add(&self) -> MessageListener {
        let (tx, receiver) = mpsc::unbounded_channel();
        let id = ListenerId::next();
        self.senders.lock().insert(id, tx);
        trace!(%id, "Message listener added");
        MessageListener { id, receiver }
    }

    /// Removes a listener, closing its channel.
    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let removed = self.senders.lock().remove(&id).is_some();
        trace!(%id, removed, "Message listener removed");
        removed
    }

    /// Delivers a message to every listener.
    ///
    /// Listeners whose receiver was dropped are pruned.
    pub(crate) fn broadcast(&self, message: &InboundMessage) {
        self.senders
            .lock()
            .retain(|_, tx| tx.send(message.clone()).is_ok());
    }

    /// Returns the number of registered listeners.
    pub(crate) fn len(&self) -> usize {
        self.senders.lock().len()
    }
}

// ============================================================================
// Tests
// ============================================================================
