//! Cantoo Embed - Host the Cantoo document editor in an iframe.
//!
//! This library mounts the Cantoo editor in a host page and drives its
//! lifecycle through a `postMessage` handshake.
//!
//! # Architecture
//!
//! - **Host page**: owns the DOM; abstracted by the [`Host`] trait
//! - **Editor (iframe)**: emits `ready`, `completed`, `destroyed`, `logout`
//!   and accepts `close`
//!
//! Key design principles:
//!
//! - Each [`Connection`] owns: one iframe + one window message listener +
//!   one event registry
//! - Every handshake is a one-shot subscription raced against a timer
//! - Teardown is idempotent and always releases the iframe
//!
//! # Quick Start
//!
//! ```no_run
//! use cantoo_embed::{ConnectionConfig, DocumentRequest, Embed, Listener, Result};
//! use cantoo_embed::host::MemoryHost;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let host = MemoryHost::new();
//!     host.add_container("editor");
//!
//!     let embed = Embed::builder().host(host).build()?;
//!
//!     let config = ConnectionConfig::builder()
//!         .container("editor")
//!         .env("develop")
//!         .id_ent("1")
//!         .uai("2")
//!         .user_id("10")
//!         .build()?;
//!
//!     let connection = embed
//!         .connect(config, DocumentRequest::load("10", Some(true))?)
//!         .await?;
//!
//!     connection.add_event_listener(Listener::on_logout(|event| {
//!         tracing::warn!(user_id = %event.user_id, "User logged out");
//!     }));
//!
//!     connection.destroy().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`connection`] | [`Connection`] lifecycle, events, iframe |
//! | [`embed`] | [`Embed`] factory and configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`host`] | [`Host`] trait, [`MemoryHost`], [`BridgeHost`] |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Editor messages, embed URL, bridge wire types |
//! | [`transport`] | WebSocket transport to the page bridge |

// ============================================================================
// Modules
// ============================================================================

/// Embed connection: iframe, message bus, lifecycle.
///
/// - [`Connection`] - Handle to one embedded editor
/// - [`Listener`] - Typed event callback
pub mod connection;

/// Embed factory and configuration.
///
/// Use [`Embed::builder()`] to create a configured instance.
pub mod embed;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Host page abstraction.
pub mod host;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Editor message types, embed URL and bridge wire format.
pub mod protocol;

/// WebSocket transport layer.
///
/// Used by [`BridgeHost`] to reach a real page.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Connection types
pub use connection::{Connection, ConnectionState, Handler, Listener, SignalHandler};

// Embed types
pub use embed::{
    ConnectionConfig, ConnectionConfigBuilder, DocumentRequest, Embed, EmbedBuilder,
    EmbedOptions, Environment,
};

// Error types
pub use error::{Error, Result};

// Host types
pub use host::{BridgeHost, Host, MemoryHost};

// Identifier types
pub use identifiers::{ContainerId, FrameId, ListenerId, RequestId};

// Protocol types
pub use protocol::{CompletedEvent, EventKind, LogoutEvent, ReadyEvent, build_url};
