//! Embed protocol messages.
//!
//! Messages exchanged over `postMessage` between the host page and the
//! embedded editor.
//!
//! | Direction | `type` | Fields |
//! |-----------|--------|--------|
//! | App → Host | `ready` | `userId`, `fileId` |
//! | App → Host | `completed` | `userId`, `fileId`, `title` |
//! | App → Host | `destroyed` | |
//! | App → Host | `logout` | `userId` |
//! | Host → App | `close` | |
//!
//! Inbound parsing is lenient: unknown types are reported as
//! [`InboundEnvelope::Unknown`] and never fail, so newer editor builds can
//! send extra message shapes without breaking older hosts.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// EventKind
// ============================================================================

/// Event kinds subscribers can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The editor finished loading a document.
    Ready,
    /// The user finished a document.
    Completed,
    /// The editor shut down.
    Destroyed,
    /// The user logged out inside the editor.
    Logout,
}

impl EventKind {
    /// All subscribable kinds.
    pub const ALL: [Self; 4] = [Self::Ready, Self::Completed, Self::Destroyed, Self::Logout];

    /// Returns the wire `type` value.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Completed => "completed",
            Self::Destroyed => "destroyed",
            Self::Logout => "logout",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Payload of a `ready` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyEvent {
    /// User the editor is signed in as.
    pub user_id: String,
    /// Document that was opened.
    pub file_id: String,
}

/// Payload of a `completed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedEvent {
    /// User that completed the document.
    pub user_id: String,
    /// Completed document.
    pub file_id: String,
    /// Final document title.
    pub title: String,
}

/// Payload of a `logout` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutEvent {
    /// User that logged out.
    pub user_id: String,
}

// ============================================================================
// InboundEnvelope
// ============================================================================

/// A parsed message from the embedded editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEnvelope {
    /// `{ type: "ready", userId, fileId }`
    Ready(ReadyEvent),
    /// `{ type: "completed", userId, fileId, title }`
    Completed(CompletedEvent),
    /// `{ type: "destroyed" }`
    Destroyed,
    /// `{ type: "logout", userId }`
    Logout(LogoutEvent),
    /// `{ type: "close" }`, echoed back by some frames; never dispatched.
    Close,
    /// Anything else, including non-object data.
    Unknown {
        /// Declared type, if any.
        message_type: Option<String>,
    },
}

impl InboundEnvelope {
    /// Parses message data received from the window message channel.
    ///
    /// Accepts either a JSON object or a string containing one.
    #[must_use]
    pub fn parse(data: &Value) -> Self {
        if let Value::String(text) = data {
            return match serde_json::from_str::<Value>(text) {
                Ok(inner @ Value::Object(_)) => Self::parse(&inner),
                _ => Self::Unknown { message_type: None },
            };
        }

        let Some(message_type) = data.get("type").and_then(Value::as_str) else {
            return Self::Unknown { message_type: None };
        };

        match message_type {
            "ready" => Self::Ready(ReadyEvent {
                user_id: get_id(data, "userId"),
                file_id: get_id(data, "fileId"),
            }),

            "completed" => Self::Completed(CompletedEvent {
                user_id: get_id(data, "userId"),
                file_id: get_id(data, "fileId"),
                title: get_id(data, "title"),
            }),

            "destroyed" => Self::Destroyed,

            "logout" => Self::Logout(LogoutEvent {
                user_id: get_id(data, "userId"),
            }),

            "close" => Self::Close,

            other => Self::Unknown {
                message_type: Some(other.to_string()),
            },
        }
    }

    /// Returns the subscribable kind, or `None` for ignored messages.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            Self::Ready(_) => Some(EventKind::Ready),
            Self::Completed(_) => Some(EventKind::Completed),
            Self::Destroyed => Some(EventKind::Destroyed),
            Self::Logout(_) => Some(EventKind::Logout),
            Self::Close | Self::Unknown { .. } => None,
        }
    }
}

/// Reads an identifier field as a string; numbers are stringified.
fn get_id(data: &Value, key: &str) -> String {
    match data.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

// ============================================================================
// OutboundMessage
// ============================================================================

/// A control message posted into the embedded editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    /// Ask the editor to save and shut down.
    Close,
}

impl OutboundMessage {
    /// Serializes the message for `postMessage`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Close => serde_json::json!({ "type": "close" }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
