//! In-memory host page.
//!
//! [`MemoryHost`] models just enough of a page for the embed protocol:
//! container elements, iframes with their attributes and navigation
//! history, messages posted into frames, and the window message channel.
//! Inbound editor messages are injected with [`MemoryHost::emit`].
//!
//! # Example
//!
//! ```
//! use cantoo_embed::host::MemoryHost;
//! use serde_json::json;
//!
//! let host = MemoryHost::new();
//! let container = host.add_container("editor");
//! assert_eq!(host.attached_frame_count(), 0);
//!
//! // Nothing listens yet, so the message is dropped.
//! host.emit("https://develop.cantoo.fr", json!({ "type": "ready" }));
//! # let _ = container;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::{ContainerId, FrameId, ListenerId};
use crate::protocol::origin_of;

use super::{FrameAttributes, Host, InboundMessage, ListenerSet, MessageListener};

// ============================================================================
// Types
// ============================================================================

/// A message posted into a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PostedMessage {
    /// Message data.
    pub message: Value,
    /// Target origin it was posted with.
    pub target_origin: String,
}

/// Snapshot of an iframe in the page model.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryFrame {
    /// Container the frame was appended to.
    pub container: ContainerId,
    /// Current `src`.
    pub src: String,
    /// Attributes set at creation.
    pub attributes: FrameAttributes,
    /// Whether the frame is still in the document.
    pub attached: bool,
    /// Every `src` the frame has had, oldest first.
    pub history: Vec<String>,
    /// Messages posted into the frame.
    pub posted: Vec<PostedMessage>,
}

/// Internal shared state.
struct MemoryHostInner {
    /// Known container elements.
    containers: Mutex<FxHashSet<ContainerId>>,
    /// Frames by handle, including detached ones.
    frames: Mutex<FxHashMap<FrameId, MemoryFrame>>,
    /// Next frame handle.
    next_frame_id: AtomicU64,
    /// Window message listeners.
    listeners: ListenerSet,
    /// Bumped on every mutation so tests can wait for page activity.
    revision: watch::Sender<u64>,
}

// ============================================================================
// MemoryHost
// ============================================================================

/// An in-process page model implementing [`Host`].
///
/// Cloning yields another handle to the same page.
#[derive(Clone)]
pub struct MemoryHost {
    inner: Arc<MemoryHostInner>,
}

impl fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHost")
            .field("frames", &self.inner.frames.lock().len())
            .field("listeners", &self.inner.listeners.len())
            .finish_non_exhaustive()
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// Creates an empty page.
    #[must_use]
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(MemoryHostInner {
                containers: Mutex::new(FxHashSet::default()),
                frames: Mutex::new(FxHashMap::default()),
                next_frame_id: AtomicU64::new(1),
                listeners: ListenerSet::default(),
                revision,
            }),
        }
    }

    /// Adds a container element and returns its handle.
    pub fn add_container(&self, id: impl Into<ContainerId>) -> ContainerId {
        let id = id.into();
        self.inner.containers.lock().insert(id.clone());
        self.bump();
        id
    }

    /// Dispatches a `message` event on the window from a window that is
    /// not one of the page's iframes.
    pub fn emit(&self, origin: impl Into<String>, data: Value) {
        self.dispatch(InboundMessage::new(origin, data));
    }

    /// Dispatches a `message` event as if sent by `frame`'s document.
    ///
    /// The message carries `frame` as its source and the origin of the
    /// frame's current `src`.
    pub fn emit_from(&self, frame: FrameId, data: Value) {
        let origin = self
            .frame(frame)
            .and_then(|f| origin_of(&f.src).ok())
            .unwrap_or_default();
        self.dispatch(InboundMessage::new(origin, data).with_source(Some(frame)));
    }

    /// Delivers a window message to every listener.
    fn dispatch(&self, message: InboundMessage) {
        trace!(origin = %message.origin, source = ?message.source, "Emitting window message");
        self.inner.listeners.broadcast(&message);
    }

    /// Returns a snapshot of a frame.
    #[must_use]
    pub fn frame(&self, id: FrameId) -> Option<MemoryFrame> {
        self.inner.frames.lock().get(&id).cloned()
    }

    /// Returns the handles of all frames ever mounted, in mount order.
    #[must_use]
    pub fn frame_ids(&self) -> Vec<FrameId> {
        let mut ids: Vec<_> = self.inner.frames.lock().keys().copied().collect();
        ids.sort_by_key(FrameId::as_u64);
        ids
    }

    /// Returns the number of frames still attached.
    #[must_use]
    pub fn attached_frame_count(&self) -> usize {
        self.inner.frames.lock().values().filter(|f| f.attached).count()
    }

    /// Returns the number of registered message listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Waits until `predicate` holds for this page.
    ///
    /// Re-evaluated after every page mutation.
    pub async fn wait_for(&self, mut predicate: impl FnMut(&Self) -> bool) {
        let mut rx = self.inner.revision.subscribe();
        loop {
            if predicate(self) {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Waits until `count` frames have been mounted and returns the latest.
    pub async fn wait_for_mounts(&self, count: usize) -> Option<FrameId> {
        self.wait_for(|host| host.inner.frames.lock().len() >= count)
            .await;
        self.frame_ids().last().copied()
    }

    /// Waits until `frame` has received `count` posted messages.
    pub async fn wait_for_posts(&self, frame: FrameId, count: usize) {
        self.wait_for(|host| host.frame(frame).is_some_and(|f| f.posted.len() >= count))
            .await;
    }

    /// Waits until `frame` has navigated `count` times after mounting.
    pub async fn wait_for_navigations(&self, frame: FrameId, count: usize) {
        self.wait_for(|host| {
            host.frame(frame)
                .is_some_and(|f| f.history.len() > count)
        })
        .await;
    }

    /// Marks the page as changed.
    fn bump(&self) {
        self.inner.revision.send_modify(|revision| *revision += 1);
    }

    /// Applies `f` to an attached frame.
    fn with_attached_frame<T>(
        &self,
        id: FrameId,
        f: impl FnOnce(&mut MemoryFrame) -> T,
    ) -> Result<T> {
        let result = {
            let mut frames = self.inner.frames.lock();
            let frame = frames
                .get_mut(&id)
                .filter(|frame| frame.attached)
                .ok_or_else(|| Error::host(format!("frame {id} is not attached")))?;
            f(frame)
        };
        self.bump();
        Ok(result)
    }
}

// ============================================================================
// MemoryHost - Host
// ============================================================================

#[async_trait]
impl Host for MemoryHost {
    async fn mount_frame(
        &self,
        container: &ContainerId,
        src: &str,
        attributes: &FrameAttributes,
    ) -> Result<FrameId> {
        if !self.inner.containers.lock().contains(container) {
            return Err(Error::host(format!("container {container} not found")));
        }

        let id = FrameId::new(self.inner.next_frame_id.fetch_add(1, Ordering::Relaxed));
        let frame = MemoryFrame {
            container: container.clone(),
            src: src.to_string(),
            attributes: attributes.clone(),
            attached: true,
            history: vec![src.to_string()],
            posted: Vec::new(),
        };
        self.inner.frames.lock().insert(id, frame);
        self.bump();

        debug!(frame_id = %id, %container, "Frame mounted");
        Ok(id)
    }

    async fn navigate_frame(&self, frame: FrameId, src: &str) -> Result<()> {
        self.with_attached_frame(frame, |f| {
            f.src = src.to_string();
            f.history.push(src.to_string());
        })
    }

    async fn unmount_frame(&self, frame: FrameId) -> Result<()> {
        let detached = {
            let mut frames = self.inner.frames.lock();
            match frames.get_mut(&frame) {
                Some(f) if f.attached => {
                    f.attached = false;
                    true
                }
                _ => false,
            }
        };

        if detached {
            debug!(frame_id = %frame, "Frame unmounted");
            self.bump();
        }
        Ok(())
    }

    async fn post_message(
        &self,
        frame: FrameId,
        message: Value,
        target_origin: &str,
    ) -> Result<()> {
        self.with_attached_frame(frame, |f| {
            f.posted.push(PostedMessage {
                message,
                target_origin: target_origin.to_string(),
            });
        })
    }

    fn add_message_listener(&self) -> MessageListener {
        let listener = self.inner.listeners.add();
        self.bump();
        listener
    }

    fn remove_message_listener(&self, id: ListenerId) -> bool {
        let removed = self.inner.listeners.remove(id);
        self.bump();
        removed
    }
}

// ============================================================================
// Tests
// ============================================================================
