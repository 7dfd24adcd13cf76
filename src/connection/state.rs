//! Connection lifecycle state.
//!
//! ```text
//! Launching ──ready──► Ready ◄──ready──┐
//!     │                  │             │
//!     │              completed         │
//!     │                  ▼             │
//!     │              Completed ────────┘
//!     │                  │
//!     └───destroyed / teardown──► Destroyed (terminal)
//! ```
//!
//! Only the message bus and teardown write the state; callers read it.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use parking_lot::Mutex;
use tracing::debug;

use crate::protocol::EventKind;

// ============================================================================
// ConnectionState
// ============================================================================

/// Coarse lifecycle of an embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Iframe created, editor not ready yet.
    Launching,
    /// Editor reported a document as loaded.
    Ready,
    /// User completed the document.
    Completed,
    /// Embed torn down. Terminal.
    Destroyed,
}

impl ConnectionState {
    /// Returns the state name.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Launching => "launching",
            Self::Ready => "ready",
            Self::Completed => "completed",
            Self::Destroyed => "destroyed",
        }
    }

    /// Returns `true` for the terminal state.
    #[inline]
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Destroyed)
    }

    /// Returns the state an inbound event moves to, if it moves at all.
    #[inline]
    #[must_use]
    pub const fn for_event(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::Ready => Some(Self::Ready),
            EventKind::Completed => Some(Self::Completed),
            EventKind::Destroyed => Some(Self::Destroyed),
            EventKind::Logout => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// StateMachine
// ============================================================================

/// Holder of the current [`ConnectionState`].
pub(crate) struct StateMachine {
    state: Mutex<ConnectionState>,
}

impl StateMachine {
    /// Creates a machine in [`ConnectionState::Launching`].
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(ConnectionState::Launching),
        }
    }

    /// Returns the current state.
    #[inline]
    pub(crate) fn get(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Applies an inbound event.
    ///
    /// Returns the new state, or `None` if the event does not transition
    /// (logout) or the machine is already terminal.
    pub(crate) fn apply(&self, kind: EventKind) -> Option<ConnectionState> {
        let next = ConnectionState::for_event(kind)?;
        self.set(next).then_some(next)
    }

    /// Moves to [`ConnectionState::Destroyed`].
    ///
    /// Returns `false` if already destroyed.
    pub(crate) fn destroy(&self) -> bool {
        self.set(ConnectionState::Destroyed)
    }

    fn set(&self, next: ConnectionState) -> bool {
        let mut state = self.state.lock();
        if state.is_terminal() {
            return false;
        }
        let previous = *state;
        *state = next;
        drop(state);

        debug!(from = %previous, to = %next, "Connection state changed");
        true
    }
}

// ============================================================================
// Tests
// ============================================================================
