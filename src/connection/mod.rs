//! Embed connection: iframe, message bus, lifecycle.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Connection`] | Handle to one embedded editor |
//! | [`ConnectionState`] | Lifecycle state |
//! | [`Listener`] | Typed event callback |
//!
//! # Lifecycle
//!
//! ```text
//! Launching ──ready──▶ Ready ──completed──▶ Completed
//!     │                  ▲                      │
//!     │                  └────────ready─────────┘
//!     └──────── destroyed / timeout / destroy() ──────▶ Destroyed
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Window message routing.
mod bus;

/// Connection handle and handshakes.
pub mod core;

/// Iframe ownership.
pub mod frame;

/// One-shot event waits.
mod handshake;

/// Typed event subscriptions.
pub mod registry;

/// Lifecycle state machine.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use core::Connection;
pub use frame::{FRAME_PERMISSIONS, FRAME_STYLE, frame_attributes};
pub use registry::{Handler, Listener, SignalHandler};
pub use state::ConnectionState;
