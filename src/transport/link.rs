//! WebSocket link to the page shim.
//!
//! After the READY handshake the socket is split in two tasks:
//!
//! ```text
//!   ShimLink::call ──► outbox ──► writer task ──► socket
//!                                                   │
//!   EventStream ◄── events ◄── reader task ◄────────┘
//!                               │
//!                               └─► in-flight table (settles `call`)
//! ```
//!
//! Either task ending marks the link closed and fails every in-flight call
//! with [`Error::ConnectionClosed`]. Dropping every [`ShimLink`] handle
//! closes the socket.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{Command, Event, Incoming, Request};

// ============================================================================
// Constants
// ============================================================================

/// How long a command may wait for its reply.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Commands allowed in flight at once.
pub const MAX_IN_FLIGHT: usize = 100;

/// How long the shim has to send READY after the upgrade.
pub const HELLO_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Types
// ============================================================================

type Socket = WebSocketStream<TcpStream>;

/// Events pushed by the shim, in arrival order.
///
/// Ends when the socket closes.
pub type EventStream = mpsc::UnboundedReceiver<Event>;

/// What the shim reported in its READY frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShimHello {
    /// URL of the page the shim runs in.
    pub page_url: String,
}

/// An established shim link and its event feed.
#[derive(Debug)]
pub struct ShimSession {
    /// Command side.
    pub link: ShimLink,
    /// READY data.
    pub hello: ShimHello,
    /// Event side.
    pub events: EventStream,
}

/// Frames queued for the writer task.
enum Outgoing {
    Text(String),
    Close,
}

// ============================================================================
// InFlight
// ============================================================================

/// Calls awaiting a reply, shared by the callers and the reader task.
#[derive(Default)]
struct InFlight {
    replies: Mutex<FxHashMap<RequestId, oneshot::Sender<Result<Value>>>>,
    closed: AtomicBool,
}

impl InFlight {
    /// Reserves a reply slot for `id`.
    fn register(&self, id: RequestId) -> Result<oneshot::Receiver<Result<Value>>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ConnectionClosed);
        }

        let mut replies = self.replies.lock();
        if replies.len() >= MAX_IN_FLIGHT {
            warn!(in_flight = replies.len(), "Bridge call rejected");
            return Err(Error::protocol(format!(
                "{MAX_IN_FLIGHT} bridge calls already in flight"
            )));
        }

        let (tx, rx) = oneshot::channel();
        replies.insert(id, tx);
        Ok(rx)
    }

    /// Drops a reply slot nobody waits on any more.
    fn forget(&self, id: &RequestId) {
        self.replies.lock().remove(id);
    }

    /// Routes one text frame from the shim.
    fn route(&self, text: &str, events: &mpsc::UnboundedSender<Event>) {
        let incoming = match Incoming::parse(text) {
            Ok(incoming) => incoming,
            Err(e) => {
                warn!(error = %e, "Unreadable bridge frame");
                return;
            }
        };

        match incoming.into_reply() {
            Ok((id, outcome)) => match self.replies.lock().remove(&id) {
                Some(tx) => {
                    let _ = tx.send(outcome);
                }
                None => debug!(%id, "Reply for a call nobody waits on"),
            },
            Err(event) => {
                trace!(method = %event.method, "Bridge event");
                let _ = events.send(event);
            }
        }
    }

    /// Marks the link closed and fails every waiting call.
    fn close(&self, reason: &'static str) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let waiting: Vec<_> = self.replies.lock().drain().map(|(_, tx)| tx).collect();
        debug!(reason, failed = waiting.len(), "Bridge link closed");
        for tx in waiting {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }
    }
}

// ============================================================================
// ShimLink
// ============================================================================

/// Command handle to the page shim.
///
/// Cloning shares the socket.
#[derive(Clone)]
pub struct ShimLink {
    outbox: mpsc::UnboundedSender<Outgoing>,
    in_flight: Arc<InFlight>,
}

impl std::fmt::Debug for ShimLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShimLink")
            .field("in_flight", &self.in_flight_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ShimLink {
    /// Reads the READY frame, then starts the reader and writer tasks.
    ///
    /// # Errors
    ///
    /// - [`Error::BridgeTimeout`] if READY does not arrive in time
    /// - [`Error::ConnectionClosed`] if the socket ends first
    /// - [`Error::Protocol`] if the first frame is not READY
    pub(crate) async fn handshake(mut socket: Socket) -> Result<ShimSession> {
        let hello = timeout(HELLO_TIMEOUT, read_hello(&mut socket))
            .await
            .map_err(|_| Error::bridge_timeout(HELLO_TIMEOUT.as_millis() as u64))??;
        debug!(page_url = %hello.page_url, "Shim said hello");

        let (sink, stream) = socket.split();
        let (outbox, outbox_rx) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let in_flight = Arc::new(InFlight::default());

        tokio::spawn(write_frames(sink, outbox_rx, Arc::clone(&in_flight)));
        tokio::spawn(read_frames(stream, events_tx, Arc::clone(&in_flight)));

        Ok(ShimSession {
            link: Self { outbox, in_flight },
            hello,
            events,
        })
    }

    /// Sends a command and waits for its result.
    ///
    /// # Errors
    ///
    /// - [`Error::Host`] if the shim reports a failure
    /// - [`Error::RequestTimeout`] if no reply arrives within 30s
    /// - [`Error::ConnectionClosed`] if the link is or becomes closed
    /// - [`Error::Protocol`] if too many calls are in flight
    pub async fn call(&self, command: Command) -> Result<Value> {
        let method = command.method();
        let request = Request::new(command);
        let id = request.id;
        let frame = request.to_frame()?;

        let reply = self.in_flight.register(id)?;
        if self.outbox.send(Outgoing::Text(frame)).is_err() {
            self.in_flight.forget(&id);
            return Err(Error::ConnectionClosed);
        }
        trace!(%id, method, "Bridge call sent");

        match timeout(REQUEST_TIMEOUT, reply).await {
            Ok(reply) => reply?,
            Err(_) => {
                self.in_flight.forget(&id);
                warn!(%id, method, "Bridge call timed out");
                Err(Error::request_timeout(id, REQUEST_TIMEOUT.as_millis() as u64))
            }
        }
    }

    /// Returns the number of calls awaiting a reply.
    #[inline]
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.replies.lock().len()
    }

    /// Returns `true` once either side of the socket has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.in_flight.closed.load(Ordering::Acquire)
    }

    /// Sends a close frame and stops the writer.
    pub fn close(&self) {
        let _ = self.outbox.send(Outgoing::Close);
    }
}

// ============================================================================
// Tasks
// ============================================================================

/// Waits for the first text frame and decodes it as READY.
async fn read_hello(socket: &mut Socket) -> Result<ShimHello> {
    while let Some(message) = socket.next().await {
        let Message::Text(text) = message? else {
            continue;
        };

        return match Incoming::parse(&text)?.into_reply() {
            Ok((id, Ok(result))) if id == RequestId::ready() => Ok(ShimHello {
                page_url: result
                    .get("pageUrl")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            Ok((_, Err(e))) => Err(e),
            _ => Err(Error::protocol("first bridge frame was not READY")),
        };
    }
    Err(Error::ConnectionClosed)
}

/// Drains the outbox into the socket.
async fn write_frames(
    mut sink: SplitSink<Socket, Message>,
    mut outbox: mpsc::UnboundedReceiver<Outgoing>,
    in_flight: Arc<InFlight>,
) {
    while let Some(outgoing) = outbox.recv().await {
        match outgoing {
            Outgoing::Text(text) => {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    warn!(error = %e, "Bridge write failed");
                    break;
                }
            }
            Outgoing::Close => break,
        }
    }

    let _ = sink.close().await;
    in_flight.close("writer stopped");
}

/// Routes socket frames until the shim goes away.
async fn read_frames(
    mut stream: SplitStream<Socket>,
    events: mpsc::UnboundedSender<Event>,
    in_flight: Arc<InFlight>,
) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => in_flight.route(&text, &events),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Bridge read failed");
                break;
            }
        }
    }

    in_flight.close("socket ended");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    const ID: &str = "550e8400-e29b-41d4-a716-446655440000";

    fn request_id() -> RequestId {
        serde_json::from_value(json!(ID)).expect("valid id")
    }

    #[tokio::test]
    async fn test_reply_settles_call() {
        let in_flight = InFlight::default();
        let (events, _events_rx) = mpsc::unbounded_channel();
        let reply = in_flight.register(request_id()).expect("register");

        in_flight.route(
            &json!({ "id": ID, "type": "success", "result": { "frameId": 2 } }).to_string(),
            &events,
        );

        let result = reply.await.expect("settled").expect("success");
        assert_eq!(result["frameId"], 2);
        assert!(in_flight.replies.lock().is_empty());
    }

    #[tokio::test]
    async fn test_error_reply_is_host_error() {
        let in_flight = InFlight::default();
        let (events, _events_rx) = mpsc::unbounded_channel();
        let reply = in_flight.register(request_id()).expect("register");

        in_flight.route(
            &json!({ "id": ID, "type": "error", "message": "frame 9 is gone" }).to_string(),
            &events,
        );

        let result = reply.await.expect("settled");
        assert!(matches!(result, Err(Error::Host { ref message }) if message == "frame 9 is gone"));
    }

    #[test]
    fn test_stray_reply_and_garbage_are_dropped() {
        let in_flight = InFlight::default();
        let (events, mut events_rx) = mpsc::unbounded_channel();

        in_flight.route(&json!({ "id": ID, "type": "success" }).to_string(), &events);
        in_flight.route("{ not json", &events);

        assert!(in_flight.replies.lock().is_empty());
        assert!(events_rx.try_recv().is_err());
    }

    #[test]
    fn test_event_goes_to_stream() {
        let in_flight = InFlight::default();
        let (events, mut events_rx) = mpsc::unbounded_channel();

        in_flight.route(
            &json!({ "id": ID, "type": "event", "method": "window.message", "params": {} })
                .to_string(),
            &events,
        );

        let event = events_rx.try_recv().expect("event forwarded");
        assert_eq!(event.method, "window.message");
    }

    #[tokio::test]
    async fn test_close_fails_waiting_calls_and_later_registrations() {
        let in_flight = InFlight::default();
        let reply = in_flight.register(request_id()).expect("register");

        in_flight.close("test");
        in_flight.close("again");

        assert!(matches!(reply.await, Ok(Err(Error::ConnectionClosed))));
        assert!(matches!(
            in_flight.register(RequestId::generate()),
            Err(Error::ConnectionClosed)
        ));
    }

    #[test]
    fn test_in_flight_limit() {
        let in_flight = InFlight::default();
        let held: Vec<_> = (0..MAX_IN_FLIGHT)
            .map(|_| in_flight.register(RequestId::generate()).expect("register"))
            .collect();

        let overflow = in_flight.register(RequestId::generate());
        assert!(matches!(overflow, Err(Error::Protocol { .. })));
        assert_eq!(held.len(), MAX_IN_FLIGHT);
    }
}
