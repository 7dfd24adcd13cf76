//! Embed coordinator and connection factory.
//!
//! The [`Embed`] struct binds a [`Host`] to a set of [`EmbedOptions`] and
//! opens [`Connection`]s on it.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::connection::Connection;
use crate::connection::core::ConnectionInner;
use crate::error::Result;
use crate::host::Host;

use super::builder::EmbedBuilder;
use super::config::{ConnectionConfig, DocumentRequest};
use super::options::EmbedOptions;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the embed.
pub(crate) struct EmbedInner {
    /// Host page.
    pub host: Arc<dyn Host>,

    /// Options applied to every connection.
    pub options: EmbedOptions,

    /// Connections opened here, tracked without keeping them alive.
    pub connections: Mutex<FxHashMap<Uuid, Weak<ConnectionInner>>>,
}

// ============================================================================
// Embed
// ============================================================================

/// Cantoo editor embedder.
///
/// Cheap to clone; clones share the host and the connection table.
///
/// # Examples
///
/// ```no_run
/// use cantoo_embed::{ConnectionConfig, DocumentRequest, Embed};
/// use cantoo_embed::host::MemoryHost;
///
/// # async fn example() -> cantoo_embed::Result<()> {
/// let host = MemoryHost::new();
/// host.add_container("editor");
///
/// let embed = Embed::builder().host(host).build()?;
/// let config = ConnectionConfig::builder()
///     .container("editor")
///     .env("preprod")
///     .user_id("10")
///     .build()?;
///
/// let connection = embed
///     .connect(config, DocumentRequest::creation("Mon devoir", None)?)
///     .await?;
/// # let _ = connection;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Embed {
    /// Shared inner state.
    pub(crate) inner: Arc<EmbedInner>,
}

// ============================================================================
// Embed - Display
// ============================================================================

impl fmt::Debug for Embed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Embed")
            .field("options", &self.inner.options)
            .field("connection_count", &self.connection_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Embed - Public API
// ============================================================================

impl Embed {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> EmbedBuilder {
        EmbedBuilder::new()
    }

    /// Returns the options applied to new connections.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &EmbedOptions {
        &self.inner.options
    }

    /// Returns the host page.
    #[inline]
    #[must_use]
    pub fn host(&self) -> &Arc<dyn Host> {
        &self.inner.host
    }

    /// Mounts the editor and waits until it reports `ready`.
    ///
    /// # Arguments
    ///
    /// * `config` - Who opens the editor and where the iframe goes
    /// * `request` - Document to create or load
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`](crate::Error::InvalidArgument) if the request is malformed
    /// - [`Error::ConnectTimeout`](crate::Error::ConnectTimeout) if the editor never becomes ready
    /// - Host errors from mounting
    pub async fn connect(
        &self,
        config: ConnectionConfig,
        request: DocumentRequest,
    ) -> Result<Connection> {
        debug!(env = %config.env, container = %config.container, "Connecting editor");

        let connection = Connection::open(
            Arc::clone(&self.inner.host),
            self.inner.options.clone(),
            config,
            request,
        )
        .await?;

        let count = {
            let mut connections = self.inner.connections.lock();
            connections.retain(|_, weak| weak.strong_count() > 0);
            connections.insert(*connection.id(), Arc::downgrade(&connection.inner));
            connections.len()
        };

        info!(id = %connection.id(), connection_count = count, "Editor connected");
        Ok(connection)
    }

    /// Returns the number of live, undestroyed connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.live_connections()
            .iter()
            .filter(|c| c.is_active())
            .count()
    }

    /// Destroys every live connection.
    ///
    /// Errors from individual connections are logged, not returned.
    pub async fn close_all(&self) {
        let connections = self.live_connections();
        self.inner.connections.lock().clear();

        info!(count = connections.len(), "Destroying all connections");

        for connection in connections {
            if !connection.is_active() {
                continue;
            }
            if let Err(e) = connection.destroy().await {
                debug!(id = %connection.id(), error = %e, "Error destroying connection during shutdown");
            }
        }
    }
}

// ============================================================================
// Embed - Internal API
// ============================================================================

impl Embed {
    /// Creates a new embed.
    pub(crate) fn new(host: Arc<dyn Host>, options: EmbedOptions) -> Self {
        debug!(?options, "Embed initialized");
        Self {
            inner: Arc::new(EmbedInner {
                host,
                options,
                connections: Mutex::new(FxHashMap::default()),
            }),
        }
    }

    /// Upgrades every tracked connection still alive.
    fn live_connections(&self) -> Vec<Connection> {
        self.inner
            .connections
            .lock()
            .values()
            .filter_map(Weak::upgrade)
            .map(|inner| Connection { inner })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
