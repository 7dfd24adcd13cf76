//! Live embed connection.
//!
//! Each [`Connection`] owns:
//! - One iframe in the host page
//! - One window message listener (the message bus)
//! - One event registry
//!
//! # Example
//!
//! ```no_run
//! use cantoo_embed::{ConnectionConfig, DocumentRequest, Embed, Listener};
//! use cantoo_embed::host::MemoryHost;
//!
//! # async fn example() -> cantoo_embed::Result<()> {
//! let host = MemoryHost::new();
//! host.add_container("editor");
//!
//! let embed = Embed::builder().host(host).build()?;
//! let config = ConnectionConfig::builder()
//!     .container("editor")
//!     .env("prod")
//!     .user_id("10")
//!     .build()?;
//!
//! let connection = embed
//!     .connect(config, DocumentRequest::load("42", None)?)
//!     .await?;
//!
//! connection.add_event_listener(Listener::on_completed(|event| {
//!     tracing::info!(title = %event.title, "Document completed");
//! }));
//!
//! connection.load_document("43", Some(true)).await?;
//! connection.destroy().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::{OnceCell, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::embed::{ConnectionConfig, DocumentRequest, EmbedOptions};
use crate::error::{Error, Result};
use crate::host::Host;
use crate::identifiers::FrameId;
use crate::protocol::{EventKind, OutboundMessage, build_url};

use super::bus::MessageBus;
use super::frame::FrameSlot;
use super::handshake::{OneShot, WaitOutcome, closed_signal};
use super::registry::{EventRegistry, Listener};
use super::state::{ConnectionState, StateMachine};

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for a connection.
pub(crate) struct ConnectionInner {
    /// Rust-side unique identifier.
    pub id: Uuid,
    /// Host page.
    pub host: Arc<dyn Host>,
    /// Timeouts and filtering.
    pub options: EmbedOptions,
    /// Origin of the embedded editor.
    pub origin: String,
    /// Connection parameters (`read_only` is reassigned by reloads).
    config: Mutex<ConnectionConfig>,
    /// Active document request.
    request: Mutex<DocumentRequest>,
    /// Current iframe source.
    url: Mutex<String>,
    /// Lifecycle state.
    pub state: StateMachine,
    /// Event subscribers.
    pub registry: EventRegistry,
    /// The owned iframe.
    pub frame: FrameSlot,
    /// Window message listener, `None` once stopped.
    bus: Mutex<Option<MessageBus>>,
    /// Flips to `true` when teardown starts; wakes pending waiters.
    pub closed: watch::Sender<bool>,
    /// Runs teardown exactly once; concurrent callers await the same run.
    torn_down: OnceCell<()>,
    /// Set while a `load_document` is pending.
    loading: AtomicBool,
}

impl ConnectionInner {
    /// Returns `true` once teardown has started.
    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Registers the message bus.
    fn start_bus(self: &Arc<Self>) {
        let bus = MessageBus::start(self);
        *self.bus.lock() = Some(bus);
    }

    /// Removes the message bus listener, at most once.
    fn stop_bus(&self) {
        if let Some(bus) = self.bus.lock().take() {
            bus.stop(self.host.as_ref());
        }
    }

    /// Releases every local resource and enters [`ConnectionState::Destroyed`].
    ///
    /// Idempotent: later or concurrent callers wait for the first run.
    pub(crate) async fn teardown(&self, reason: &'static str) {
        self.torn_down
            .get_or_init(|| async {
                debug!(id = %self.id, reason, listeners = self.registry.total(), "Tearing down connection");
                self.state.destroy();
                self.closed.send_replace(true);
                self.stop_bus();
                self.registry.clear();
                self.frame.unmount(self.host.as_ref()).await;
                info!(id = %self.id, reason, "Connection destroyed");
            })
            .await;
    }

    /// Returns `true` if `source` is this connection's iframe.
    ///
    /// A frame message can overtake the mount reply on a bridged host, so
    /// until the handle is known this waits for it or for teardown.
    pub(crate) async fn owns_frame(&self, source: FrameId) -> bool {
        if let Some(id) = self.frame.frame_id() {
            return id == source;
        }

        let mut closed = self.closed.subscribe();
        tokio::select! {
            biased;
            () = closed_signal(&mut closed) => false,
            id = self.frame.assigned() => id == source,
        }
    }

    /// Fails fast on a destroyed connection.
    fn ensure_active(&self) -> Result<FrameId> {
        if self.is_closed() || self.state.get().is_terminal() {
            return Err(Error::NoActiveConnection);
        }
        self.frame.mounted().ok_or(Error::NoActiveConnection)
    }
}

impl Drop for ConnectionInner {
    fn drop(&mut self) {
        if self.torn_down.initialized() {
            return;
        }

        self.stop_bus();

        if let Some(frame) = self.frame.take_mounted() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let host = Arc::clone(&self.host);
                    handle.spawn(async move {
                        if let Err(e) = host.unmount_frame(frame).await {
                            warn!(frame_id = %frame, error = %e, "Failed to detach dropped iframe");
                        }
                    });
                }
                Err(_) => {
                    warn!(id = %self.id, frame_id = %frame, "Connection dropped outside a runtime; iframe left attached");
                }
            }
        }

        debug!(id = %self.id, "Connection dropped without destroy");
    }
}

// ============================================================================
// LoadGuard
// ============================================================================

/// Marks a `load_document` as pending for its lifetime.
struct LoadGuard<'a>(&'a AtomicBool);

impl<'a> LoadGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            return Err(Error::operation_in_progress("load_document"));
        }
        Ok(Self(flag))
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ============================================================================
// Connection
// ============================================================================

/// A handle to an embedded editor.
///
/// Cloning yields another handle to the same embed. Once destroyed, every
/// operation fails with [`Error::NoActiveConnection`].
#[derive(Clone)]
pub struct Connection {
    /// Shared inner state.
    pub(crate) inner: Arc<ConnectionInner>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("state", &self.inner.state.get())
            .field("frame_id", &self.inner.frame.frame_id())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Connection - Connect
// ============================================================================

impl Connection {
    /// Mounts the editor and waits for its first `ready`.
    ///
    /// The URL is built before anything touches the host, so a bad request
    /// never mounts an iframe.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if the request is malformed
    /// - [`Error::ConnectTimeout`] if `ready` does not arrive in time
    /// - [`Error::ConnectionClosed`] if the editor reports `destroyed` first
    /// - Host errors from mounting
    pub(crate) async fn open(
        host: Arc<dyn Host>,
        options: EmbedOptions,
        config: ConnectionConfig,
        request: DocumentRequest,
    ) -> Result<Self> {
        let url = build_url(&config, &request)?;
        let container = config.container.clone();

        let inner = Arc::new(ConnectionInner {
            id: Uuid::new_v4(),
            host,
            origin: config.env.origin(),
            options,
            config: Mutex::new(config),
            request: Mutex::new(request),
            url: Mutex::new(url.clone()),
            state: StateMachine::new(),
            registry: EventRegistry::default(),
            frame: FrameSlot::new(),
            bus: Mutex::new(None),
            closed: watch::channel(false).0,
            torn_down: OnceCell::new(),
            loading: AtomicBool::new(false),
        });

        debug!(id = %inner.id, %url, "Opening connection");

        inner.start_bus();
        let waiter = OneShot::ready(&inner.registry, &inner.closed);

        if let Err(e) = inner.frame.mount(inner.host.as_ref(), &container, &url).await {
            warn!(id = %inner.id, error = %e, "Failed to mount iframe");
            waiter.cancel(&inner.registry);
            inner.teardown("mount failed").await;
            return Err(e);
        }

        let limit = inner.options.connect_timeout;
        match waiter.wait(&inner.registry, limit).await {
            WaitOutcome::Fired(event) => {
                info!(id = %inner.id, user_id = %event.user_id, file_id = %event.file_id, "Editor ready");
                Ok(Self { inner })
            }
            WaitOutcome::TimedOut => {
                warn!(id = %inner.id, timeout_ms = limit.as_millis() as u64, "Editor never became ready");
                inner.teardown("connect timeout").await;
                Err(Error::connect_timeout(limit.as_millis() as u64))
            }
            WaitOutcome::Closed => {
                inner.teardown("closed during connect").await;
                Err(Error::ConnectionClosed)
            }
        }
    }
}

// ============================================================================
// Connection - Accessors
// ============================================================================

impl Connection {
    /// Returns the Rust-side unique ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &Uuid {
        &self.inner.id
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    /// Returns `true` until the connection is destroyed.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.ensure_active().is_ok()
    }

    /// Returns the iframe handle.
    #[inline]
    #[must_use]
    pub fn frame_id(&self) -> Option<FrameId> {
        self.inner.frame.frame_id()
    }

    /// Returns a copy of the connection parameters.
    #[must_use]
    pub fn config(&self) -> ConnectionConfig {
        self.inner.config.lock().clone()
    }

    /// Returns the active document request.
    #[must_use]
    pub fn current_request(&self) -> DocumentRequest {
        self.inner.request.lock().clone()
    }

    /// Returns the iframe's current source URL.
    #[must_use]
    pub fn url(&self) -> String {
        self.inner.url.lock().clone()
    }

    /// Returns the number of subscribers registered for `kind`.
    #[inline]
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.registry.count(kind)
    }
}

// ============================================================================
// Connection - Events
// ============================================================================

impl Connection {
    /// Subscribes a listener. Registering one listener twice calls it twice.
    pub fn add_event_listener(&self, listener: Listener) {
        debug!(id = %self.inner.id, kind = %listener.kind(), "Event listener added");
        self.inner.registry.add(listener);
    }

    /// Removes every registration of `listener`.
    ///
    /// Returns how many registrations were removed.
    pub fn remove_event_listener(&self, listener: &Listener) -> usize {
        let removed = self.inner.registry.remove(listener);
        debug!(id = %self.inner.id, kind = %listener.kind(), removed, "Event listener removed");
        removed
    }
}

// ============================================================================
// Connection - Lifecycle
// ============================================================================

impl Connection {
    /// Opens another document in the same iframe.
    ///
    /// Switches the active request to a load request, reloads the iframe and
    /// waits for the editor's next `ready`. A timeout destroys the
    /// connection.
    ///
    /// # Arguments
    ///
    /// * `file_id` - Document to open
    /// * `read_only` - Overrides the connection's read-only flag when set
    ///
    /// # Errors
    ///
    /// - [`Error::NoActiveConnection`] if the connection is destroyed
    /// - [`Error::OperationInProgress`] if another load is pending
    /// - [`Error::InvalidArgument`] if `file_id` is empty
    /// - [`Error::LoadTimeout`] if `ready` does not arrive in time
    /// - [`Error::ConnectionClosed`] if the connection is destroyed meanwhile
    pub async fn load_document(
        &self,
        file_id: impl Into<String>,
        read_only: Option<bool>,
    ) -> Result<()> {
        let inner = &self.inner;
        inner.ensure_active()?;

        let file_id = file_id.into();
        let request = DocumentRequest::load(file_id.clone(), read_only)?;
        let _guard = LoadGuard::acquire(&inner.loading)?;

        let url = {
            let mut config = inner.config.lock();
            let mut next = config.clone();
            if let Some(read_only) = read_only {
                next.read_only = read_only;
            }
            let url = build_url(&next, &request)?;
            *config = next;
            url
        };
        *inner.request.lock() = request;
        *inner.url.lock() = url.clone();

        debug!(id = %inner.id, %file_id, ?read_only, "Loading document");

        let waiter = OneShot::ready(&inner.registry, &inner.closed);
        if let Err(e) = inner.frame.navigate(inner.host.as_ref(), &url).await {
            warn!(id = %inner.id, error = %e, "Failed to reload iframe");
            waiter.cancel(&inner.registry);
            inner.teardown("navigate failed").await;
            return Err(e);
        }

        let limit = inner.options.load_timeout;
        match waiter.wait(&inner.registry, limit).await {
            WaitOutcome::Fired(event) => {
                if event.file_id != file_id {
                    debug!(id = %inner.id, expected = %file_id, got = %event.file_id, "Ready for a different file");
                }
                info!(id = %inner.id, %file_id, "Document loaded");
                Ok(())
            }
            WaitOutcome::TimedOut => {
                warn!(id = %inner.id, %file_id, timeout_ms = limit.as_millis() as u64, "Document load timed out");
                inner.teardown("load timeout").await;
                Err(Error::load_timeout(file_id, limit.as_millis() as u64))
            }
            WaitOutcome::Closed => Err(Error::ConnectionClosed),
        }
    }

    /// Asks the editor to close, then releases the iframe.
    ///
    /// Local teardown runs whether or not the editor acknowledges, so the
    /// embed is always released when this returns.
    ///
    /// # Errors
    ///
    /// - [`Error::NoActiveConnection`] if there is no live iframe
    /// - [`Error::DestroyTimeout`] if `destroyed` does not arrive in time
    /// - Host errors from posting the close request
    pub async fn destroy(&self) -> Result<()> {
        let inner = &self.inner;
        let frame = inner.ensure_active()?;

        debug!(id = %inner.id, frame_id = %frame, "Requesting editor close");

        let waiter = OneShot::destroyed(&inner.registry, &inner.closed);
        let result = match inner
            .host
            .post_message(frame, OutboundMessage::Close.to_value(), &inner.origin)
            .await
        {
            Err(e) => {
                warn!(id = %inner.id, error = %e, "Failed to post close request");
                waiter.cancel(&inner.registry);
                Err(e)
            }
            Ok(()) => {
                let limit = inner.options.destroy_timeout;
                match waiter.wait(&inner.registry, limit).await {
                    WaitOutcome::Fired(()) | WaitOutcome::Closed => Ok(()),
                    WaitOutcome::TimedOut => {
                        warn!(id = %inner.id, timeout_ms = limit.as_millis() as u64, "Editor did not acknowledge close");
                        Err(Error::destroy_timeout(limit.as_millis() as u64))
                    }
                }
            }
        };

        inner.teardown("destroy").await;
        result
    }
}
