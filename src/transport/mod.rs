//! WebSocket transport to the page bridge shim.
//!
//! The [`BridgeHost`](crate::host::BridgeHost) drives a real page through a
//! small script (the shim) that connects back over WebSocket, executes frame
//! commands and forwards window `message` events.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  BridgeHost     │                              │  Host page      │
//! │                 │         WebSocket            │                 │
//! │  BridgeServer   │◄────────────────────────────►│  Bridge shim    │
//! │  → ShimLink     │      localhost:PORT          │  (iframe, DOM)  │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `link` | READY handshake, command calls, event stream |
//! | `server` | Listener the shim connects to |

// ============================================================================
// Submodules
// ============================================================================

/// Socket tasks and command correlation.
pub mod link;

/// Listener for the bridge shim.
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use link::{EventStream, ShimHello, ShimLink, ShimSession};
pub use server::BridgeServer;
