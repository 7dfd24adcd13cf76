//! Window message bus.
//!
//! One host listener per connection feeds a background task that decodes
//! editor messages and routes them through the state machine and the event
//! registry. The task holds only a weak reference, so it never keeps a
//! dropped connection alive.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};

use tracing::{debug, trace, warn};

use crate::host::{Host, InboundMessage};
use crate::identifiers::ListenerId;
use crate::protocol::InboundEnvelope;

use super::core::ConnectionInner;

// ============================================================================
// MessageBus
// ============================================================================

/// Handle to a connection's window message listener.
#[derive(Debug)]
pub(crate) struct MessageBus {
    listener_id: ListenerId,
}

impl MessageBus {
    /// Registers a host listener and spawns the dispatch task.
    pub(crate) fn start(inner: &Arc<ConnectionInner>) -> Self {
        let listener = inner.host.add_message_listener();
        let listener_id = listener.id;
        let weak = Arc::downgrade(inner);
        let mut receiver = listener.receiver;

        tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                let Some(inner) = Weak::upgrade(&weak) else {
                    break;
                };
                dispatch(&inner, message).await;
            }
            trace!(%listener_id, "Message bus stopped");
        });

        debug!(id = %inner.id, %listener_id, "Message bus started");
        Self { listener_id }
    }

    /// Removes the host listener, ending the dispatch task.
    pub(crate) fn stop(self, host: &dyn Host) {
        if !host.remove_message_listener(self.listener_id) {
            warn!(listener_id = %self.listener_id, "Message listener already removed");
        }
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Returns `true` if `origin` may deliver editor events.
fn accepts_origin(inner: &ConnectionInner, origin: &str) -> bool {
    !inner.options.verify_origin || origin.is_empty() || origin == inner.origin
}

/// Routes one window message.
///
/// Messages are accepted when their origin matches the editor's and, if
/// the host resolved the sending iframe, when that iframe is this
/// connection's own.
async fn dispatch(inner: &Arc<ConnectionInner>, message: InboundMessage) {
    if !accepts_origin(inner, &message.origin) {
        debug!(id = %inner.id, origin = %message.origin, "Message from foreign origin dropped");
        return;
    }

    let envelope = InboundEnvelope::parse(&message.data);
    let Some(kind) = envelope.kind() else {
        trace!(id = %inner.id, ?envelope, "Ignoring non-editor message");
        return;
    };

    if inner.is_closed() || inner.state.get().is_terminal() {
        trace!(id = %inner.id, %kind, "Event after destruction ignored");
        return;
    }

    if let Some(source) = message.source
        && !inner.owns_frame(source).await
    {
        trace!(id = %inner.id, %kind, frame_id = %source, "Message from another iframe ignored");
        return;
    }

    inner.state.apply(kind);
    debug!(id = %inner.id, %kind, "Editor event");

    match envelope {
        InboundEnvelope::Ready(event) => inner.registry.emit_ready(&event),
        InboundEnvelope::Completed(event) => inner.registry.emit_completed(&event),
        InboundEnvelope::Logout(event) => inner.registry.emit_logout(&event),
        InboundEnvelope::Destroyed => {
            inner.registry.emit_destroyed();
            inner.teardown("editor destroyed").await;
        }
        InboundEnvelope::Close | InboundEnvelope::Unknown { .. } => {}
    }
}
