//! Protocol message types.
//!
//! Two protocols live here:
//!
//! - The **embed protocol**: the iframe URL and the `postMessage` envelopes
//!   exchanged with the embedded editor.
//! - The **bridge protocol**: JSON frames exchanged with the page shim that
//!   backs [`BridgeHost`](crate::host::BridgeHost).
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `InboundEnvelope` | Editor → Host | Lifecycle events |
//! | `OutboundMessage` | Host → Editor | Close request |
//! | `Request` | Crate → Shim | DOM command |
//! | `Incoming` | Shim → Crate | Command reply or event |
//! | `Event` | Shim → Crate | Window message forwarding (inside `Incoming`) |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `url` | Embed URL construction |
//! | `message` | Embed envelopes and payloads |
//! | `command` | Bridge command definitions |
//! | `event` | Bridge event types |
//! | `request` | Bridge requests and incoming frames |

// ============================================================================
// Submodules
// ============================================================================

/// Bridge command definitions.
pub mod command;

/// Bridge event types.
pub mod event;

/// Embed protocol envelopes.
pub mod message;

/// Bridge requests and incoming frames.
pub mod request;

/// Embed URL construction.
pub mod url;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{Command, FrameCommand};
pub use event::{Event, ParsedEvent};
pub use message::{
    CompletedEvent, EventKind, InboundEnvelope, LogoutEvent, OutboundMessage, ReadyEvent,
};
pub use request::{Incoming, Request};
pub use url::{EMBED_PATH, build_url, origin_of};
