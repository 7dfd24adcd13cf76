//! One-shot event waits with timeouts.
//!
//! Every handshake pairs a single-use registry subscription with a timer.
//! The subscription is registered *before* the action that triggers the
//! event (mount, navigate, post), so a fast editor cannot be missed. When
//! either side wins, the other is dropped: the timer goes out of scope and
//! the subscription is removed from the registry, so a late event can never
//! settle an operation twice.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tokio::time::sleep;
use tracing::trace;

use crate::protocol::{EventKind, ReadyEvent};

use super::registry::{EventRegistry, Listener};

// ============================================================================
// Types
// ============================================================================

/// Sender slot shared with the registered callback.
type SenderSlot<T> = Arc<Mutex<Option<oneshot::Sender<T>>>>;

/// How a wait ended.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum WaitOutcome<T> {
    /// The event arrived.
    Fired(T),
    /// The timer elapsed first.
    TimedOut,
    /// The connection was torn down first.
    Closed,
}

// ============================================================================
// OneShot
// ============================================================================

/// A pending single-use subscription.
pub(crate) struct OneShot<T> {
    /// Registered callback, kept for deregistration.
    listener: Listener,
    /// Resolved by the callback.
    rx: oneshot::Receiver<T>,
    /// Flips to `true` on teardown.
    closed: watch::Receiver<bool>,
}

impl OneShot<ReadyEvent> {
    /// Subscribes to the next `ready` event.
    pub(crate) fn ready(registry: &EventRegistry, closed: &watch::Sender<bool>) -> Self {
        Self::register(registry, closed, |slot| {
            Listener::on_ready(move |event| {
                if let Some(tx) = slot.lock().take() {
                    let _ = tx.send(event.clone());
                }
            })
        })
    }
}

impl OneShot<()> {
    /// Subscribes to the next `destroyed` event.
    pub(crate) fn destroyed(registry: &EventRegistry, closed: &watch::Sender<bool>) -> Self {
        Self::register(registry, closed, |slot| {
            Listener::on_destroyed(move || {
                if let Some(tx) = slot.lock().take() {
                    let _ = tx.send(());
                }
            })
        })
    }
}

impl<T> OneShot<T> {
    /// Builds the callback around a fresh channel and registers it.
    fn register(
        registry: &EventRegistry,
        closed: &watch::Sender<bool>,
        make_listener: impl FnOnce(SenderSlot<T>) -> Listener,
    ) -> Self {
        let (tx, rx) = oneshot::channel();
        let listener = make_listener(Arc::new(Mutex::new(Some(tx))));
        trace!(kind = %listener.kind(), "One-shot subscription registered");
        registry.add(listener.clone());

        Self {
            listener,
            rx,
            closed: closed.subscribe(),
        }
    }

    /// Returns the subscribed kind.
    pub(crate) fn kind(&self) -> EventKind {
        self.listener.kind()
    }

    /// Waits for the event, the timer, or teardown; whichever comes first.
    ///
    /// The subscription is deregistered on every exit path.
    pub(crate) async fn wait(self, registry: &EventRegistry, limit: Duration) -> WaitOutcome<T> {
        let Self {
            listener,
            mut rx,
            mut closed,
        } = self;

        let outcome = tokio::select! {
            biased;

            fired = &mut rx => match fired {
                Ok(value) => WaitOutcome::Fired(value),
                Err(_) => WaitOutcome::Closed,
            },

            () = closed_signal(&mut closed) => WaitOutcome::Closed,

            () = sleep(limit) => WaitOutcome::TimedOut,
        };

        registry.remove(&listener);
        trace!(kind = %listener.kind(), "One-shot subscription released");
        outcome
    }

    /// Drops the subscription without waiting.
    pub(crate) fn cancel(self, registry: &EventRegistry) {
        registry.remove(&self.listener);
        trace!(kind = %self.kind(), "One-shot subscription cancelled");
    }
}

/// Resolves once teardown has started.
pub(super) async fn closed_signal(closed: &mut watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}

// ============================================================================
// Tests
// ============================================================================
