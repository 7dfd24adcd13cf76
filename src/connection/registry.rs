//! Typed event subscriptions.
//!
//! Each [`EventKind`] has its own ordered list of callbacks taking that
//! kind's payload. A [`Listener`] carries both the kind and the callback, so
//! a `ready` callback can never be handed a `completed` payload.
//!
//! Identity is the callback allocation: clones of one [`Listener`] compare
//! equal, and removing it drops every registration of it.
//!
//! ```
//! use cantoo_embed::Listener;
//!
//! let on_ready = Listener::on_ready(|event| {
//!     tracing::info!(file_id = %event.file_id, "Document ready");
//! });
//! assert!(on_ready.same_as(&on_ready.clone()));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::protocol::{CompletedEvent, EventKind, LogoutEvent, ReadyEvent};

// ============================================================================
// Types
// ============================================================================

/// Callback for an event kind carrying payload `E`.
pub type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Callback for an event kind without payload.
pub type SignalHandler = Arc<dyn Fn() + Send + Sync>;

// ============================================================================
// Listener
// ============================================================================

/// A callback bound to one event kind.
#[derive(Clone)]
pub enum Listener {
    /// Called with the `ready` payload.
    Ready(Handler<ReadyEvent>),
    /// Called with the `completed` payload.
    Completed(Handler<CompletedEvent>),
    /// Called when the editor reports `destroyed`.
    Destroyed(SignalHandler),
    /// Called with the `logout` payload.
    Logout(Handler<LogoutEvent>),
}

impl Listener {
    /// Creates a `ready` listener.
    pub fn on_ready(f: impl Fn(&ReadyEvent) + Send + Sync + 'static) -> Self {
        Self::Ready(Arc::new(f))
    }

    /// Creates a `completed` listener.
    pub fn on_completed(f: impl Fn(&CompletedEvent) + Send + Sync + 'static) -> Self {
        Self::Completed(Arc::new(f))
    }

    /// Creates a `destroyed` listener.
    pub fn on_destroyed(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self::Destroyed(Arc::new(f))
    }

    /// Creates a `logout` listener.
    pub fn on_logout(f: impl Fn(&LogoutEvent) + Send + Sync + 'static) -> Self {
        Self::Logout(Arc::new(f))
    }

    /// Returns the kind this listener is bound to.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Ready(_) => EventKind::Ready,
            Self::Completed(_) => EventKind::Completed,
            Self::Destroyed(_) => EventKind::Destroyed,
            Self::Logout(_) => EventKind::Logout,
        }
    }

    /// Returns `true` if both listeners share one callback allocation.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Ready(a), Self::Ready(b)) => Arc::ptr_eq(a, b),
            (Self::Completed(a), Self::Completed(b)) => Arc::ptr_eq(a, b),
            (Self::Destroyed(a), Self::Destroyed(b)) => Arc::ptr_eq(a, b),
            (Self::Logout(a), Self::Logout(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener").field(&self.kind()).finish()
    }
}

// ============================================================================
// EventRegistry
// ============================================================================

/// Per-kind callback lists.
#[derive(Default)]
struct Lists {
    ready: Vec<Handler<ReadyEvent>>,
    completed: Vec<Handler<CompletedEvent>>,
    destroyed: Vec<SignalHandler>,
    logout: Vec<Handler<LogoutEvent>>,
}

/// Ordered subscriber lists for every event kind.
///
/// Dispatch clones the list before invoking callbacks, so a callback may add
/// or remove listeners (including itself) without deadlocking; changes take
/// effect from the next dispatch.
#[derive(Default)]
pub(crate) struct EventRegistry {
    lists: Mutex<Lists>,
}

impl EventRegistry {
    /// Appends a listener to its kind's list.
    pub(crate) fn add(&self, listener: Listener) {
        let mut lists = self.lists.lock();
        match listener {
            Listener::Ready(h) => lists.ready.push(h),
            Listener::Completed(h) => lists.completed.push(h),
            Listener::Destroyed(h) => lists.destroyed.push(h),
            Listener::Logout(h) => lists.logout.push(h),
        }
    }

    /// Removes every registration of `listener`. Returns how many were removed.
    pub(crate) fn remove(&self, listener: &Listener) -> usize {
        fn retain_others<T: ?Sized>(list: &mut Vec<Arc<T>>, target: &Arc<T>) -> usize {
            let before = list.len();
            list.retain(|h| !Arc::ptr_eq(h, target));
            before - list.len()
        }

        let mut lists = self.lists.lock();
        match listener {
            Listener::Ready(h) => retain_others(&mut lists.ready, h),
            Listener::Completed(h) => retain_others(&mut lists.completed, h),
            Listener::Destroyed(h) => retain_others(&mut lists.destroyed, h),
            Listener::Logout(h) => retain_others(&mut lists.logout, h),
        }
    }

    /// Returns the number of registrations for `kind`.
    pub(crate) fn count(&self, kind: EventKind) -> usize {
        let lists = self.lists.lock();
        match kind {
            EventKind::Ready => lists.ready.len(),
            EventKind::Completed => lists.completed.len(),
            EventKind::Destroyed => lists.destroyed.len(),
            EventKind::Logout => lists.logout.len(),
        }
    }

    /// Returns the total number of registrations.
    pub(crate) fn total(&self) -> usize {
        EventKind::ALL.iter().map(|kind| self.count(*kind)).sum()
    }

    /// Drops every registration.
    pub(crate) fn clear(&self) {
        *self.lists.lock() = Lists::default();
    }

    /// Invokes `ready` callbacks in registration order.
    pub(crate) fn emit_ready(&self, event: &ReadyEvent) {
        let handlers = self.lists.lock().ready.clone();
        for handler in handlers {
            handler(event);
        }
    }

    /// Invokes `completed` callbacks in registration order.
    pub(crate) fn emit_completed(&self, event: &CompletedEvent) {
        let handlers = self.lists.lock().completed.clone();
        for handler in handlers {
            handler(event);
        }
    }

    /// Invokes `destroyed` callbacks in registration order.
    pub(crate) fn emit_destroyed(&self) {
        let handlers = self.lists.lock().destroyed.clone();
        for handler in handlers {
            handler();
        }
    }

    /// Invokes `logout` callbacks in registration order.
    pub(crate) fn emit_logout(&self, event: &LogoutEvent) {
        let handlers = self.lists.lock().logout.clone();
        for handler in handlers {
            handler(event);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
