//! Bridge events.
//!
//! Events are notifications the page shim pushes without a request. The
//! only one the crate consumes is `window.message`, which carries every
//! `message` event dispatched on the host window.
//!
//! ```json
//! {
//!   "id": "event-uuid",
//!   "type": "event",
//!   "method": "window.message",
//!   "params": { "origin": "https://cantoo.fr", "frameId": 7, "data": { ... } }
//! }
//! ```
//!
//! `frameId` is present when `event.source` is the content window of an
//! iframe the shim mounted.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

use crate::identifiers::FrameId;

// ============================================================================
// Event
// ============================================================================

/// An event notification from the page shim.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Event name in `module.eventName` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,
}

impl Event {
    /// Parses the event into a typed variant.
    #[must_use]
    pub fn parse(self) -> ParsedEvent {
        match self.method.as_str() {
            "window.message" => {
                let Value::Object(mut params) = self.params else {
                    return ParsedEvent::WindowMessage {
                        origin: String::new(),
                        source: None,
                        data: Value::Null,
                    };
                };
                ParsedEvent::WindowMessage {
                    origin: params
                        .get("origin")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    source: params
                        .get("frameId")
                        .and_then(Value::as_u64)
                        .map(FrameId::new),
                    data: params.remove("data").unwrap_or(Value::Null),
                }
            }

            _ => ParsedEvent::Unknown {
                method: self.method,
                params: self.params,
            },
        }
    }
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Typed view of a bridge event.
#[derive(Debug, Clone)]
pub enum ParsedEvent {
    /// A `message` event reached the host window.
    WindowMessage {
        /// Origin of the sending document.
        origin: String,
        /// Mounted iframe that sent it, if any.
        source: Option<FrameId>,
        /// Message data as posted.
        data: Value,
    },

    /// Any other event.
    Unknown {
        /// Event method.
        method: String,
        /// Event params.
        params: Value,
    },
}

// ============================================================================
// Tests
// ============================================================================
