//! Bridge frames: commands out, replies and events in.
//!
//! Every text frame the shim sends carries a `type` discriminator:
//!
//! | `type` | Meaning | Correlated by |
//! |--------|---------|---------------|
//! | `success` | Command completed, optional `result` | `id` |
//! | `error` | Command failed, `error` code and `message` | `id` |
//! | `event` | Unsolicited notification | |
//!
//! The READY handshake is a `success` frame for the nil request id.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::{Command, Event};

// ============================================================================
// Request
// ============================================================================

/// A command sent to the page shim.
///
/// ```json
/// { "id": "uuid", "method": "frame.mount", "params": { ... } }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Correlates the reply.
    pub id: RequestId,

    /// Method and params.
    #[serde(flatten)]
    pub command: Command,
}

impl Request {
    /// Wraps `command` under a fresh request id.
    #[inline]
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            id: RequestId::generate(),
            command,
        }
    }

    /// Serializes the request into a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if a param cannot be serialized.
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Incoming
// ============================================================================

/// A text frame received from the page shim.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Incoming {
    /// A command completed.
    Success {
        /// Id of the request being answered.
        id: RequestId,
        /// Command result; `null` when the command returns nothing.
        #[serde(default)]
        result: Value,
    },

    /// A command failed in the page.
    Error {
        /// Id of the request being answered.
        id: RequestId,
        /// Short error code.
        #[serde(default)]
        error: Option<String>,
        /// Human readable description.
        #[serde(default)]
        message: Option<String>,
    },

    /// An unsolicited notification.
    Event(Event),
}

impl Incoming {
    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] for frames that are not shim messages.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Splits a reply into its request id and outcome.
    ///
    /// Returns `Err(event)` for events, which answer no request.
    pub fn into_reply(self) -> std::result::Result<(RequestId, Result<Value>), Event> {
        match self {
            Self::Success { id, result } => Ok((id, Ok(result))),
            Self::Error { id, error, message } => {
                let message = message
                    .or(error)
                    .unwrap_or_else(|| "bridge command failed".to_string());
                Ok((id, Err(Error::host(message))))
            }
            Self::Event(event) => Err(event),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::FrameId;
    use crate::protocol::FrameCommand;

    #[test]
    fn test_request_frame_layout() {
        let request = Request::new(Command::Frame(FrameCommand::Unmount {
            frame_id: FrameId::new(4),
        }));

        let value: Value = serde_json::from_str(&request.to_frame().expect("serialize"))
            .expect("valid json");
        assert_eq!(value["id"], request.id.to_string());
        assert_eq!(value["method"], "frame.unmount");
        assert_eq!(value["params"]["frameId"], 4);
    }

    #[test]
    fn test_ready_frame_is_success_for_nil_id() {
        let incoming = Incoming::parse(
            r#"{"id":"00000000-0000-0000-0000-000000000000","type":"success","result":{"pageUrl":"http://localhost/"}}"#,
        )
        .expect("parse");

        let (id, outcome) = incoming.into_reply().expect("reply");
        assert_eq!(id, RequestId::ready());
        assert_eq!(outcome.expect("success")["pageUrl"], "http://localhost/");
    }

    #[test]
    fn test_success_without_result_is_null() {
        let incoming =
            Incoming::parse(r#"{"id":"550e8400-e29b-41d4-a716-446655440000","type":"success"}"#)
                .expect("parse");
        let (_, outcome) = incoming.into_reply().expect("reply");
        assert_eq!(outcome.expect("success"), Value::Null);
    }

    #[test]
    fn test_error_prefers_message_over_code() {
        let incoming = Incoming::parse(
            r#"{"id":"550e8400-e29b-41d4-a716-446655440000","type":"error","error":"no such container","message":"Container #root not found"}"#,
        )
        .expect("parse");

        let (_, outcome) = incoming.into_reply().expect("reply");
        assert!(matches!(outcome, Err(Error::Host { ref message }) if message == "Container #root not found"));

        let bare = Incoming::parse(
            r#"{"id":"550e8400-e29b-41d4-a716-446655440000","type":"error","error":"detached"}"#,
        )
        .expect("parse");
        let (_, outcome) = bare.into_reply().expect("reply");
        assert!(matches!(outcome, Err(Error::Host { ref message }) if message == "detached"));
    }

    #[test]
    fn test_event_answers_no_request() {
        let incoming = Incoming::parse(
            r#"{"id":"550e8400-e29b-41d4-a716-446655440000","type":"event","method":"window.message","params":{}}"#,
        )
        .expect("parse");

        let event = incoming.into_reply().expect_err("events are not replies");
        assert_eq!(event.method, "window.message");
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(Incoming::parse(r#"{"type":"progress","id":"x"}"#).is_err());
        assert!(Incoming::parse("not json").is_err());
    }
}
