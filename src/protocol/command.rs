//! Bridge command definitions.
//!
//! Commands follow the `module.methodName` format. The page shim executes
//! them against the real DOM.
//!
//! | Method | Params | Result |
//! |--------|--------|--------|
//! | `frame.mount` | `containerId`, `src`, `allow`, `style` | `frameId` |
//! | `frame.navigate` | `frameId`, `src` | |
//! | `frame.unmount` | `frameId` | |
//! | `frame.postMessage` | `frameId`, `message`, `targetOrigin` | |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::{ContainerId, FrameId};

// ============================================================================
// Command Wrapper
// ============================================================================

/// All bridge commands organized by module.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    /// Frame module commands.
    Frame(FrameCommand),
}

impl Command {
    /// Returns the wire method name, for logging.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Frame(FrameCommand::Mount { .. }) => "frame.mount",
            Self::Frame(FrameCommand::Navigate { .. }) => "frame.navigate",
            Self::Frame(FrameCommand::Unmount { .. }) => "frame.unmount",
            Self::Frame(FrameCommand::PostMessage { .. }) => "frame.postMessage",
        }
    }
}

// ============================================================================
// Frame Commands
// ============================================================================

/// Frame module commands for iframe lifecycle and messaging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum FrameCommand {
    /// Create an iframe and append it to a container.
    #[serde(rename = "frame.mount")]
    Mount {
        /// Container element ID.
        #[serde(rename = "containerId")]
        container_id: ContainerId,
        /// Iframe source URL.
        src: String,
        /// Permission policy (`allow` attribute).
        allow: String,
        /// Inline CSS.
        style: String,
    },

    /// Reassign an iframe's source.
    #[serde(rename = "frame.navigate")]
    Navigate {
        /// Target iframe.
        #[serde(rename = "frameId")]
        frame_id: FrameId,
        /// New source URL.
        src: String,
    },

    /// Detach an iframe from its container.
    #[serde(rename = "frame.unmount")]
    Unmount {
        /// Target iframe.
        #[serde(rename = "frameId")]
        frame_id: FrameId,
    },

    /// Post a message into an iframe's content window.
    #[serde(rename = "frame.postMessage")]
    PostMessage {
        /// Target iframe.
        #[serde(rename = "frameId")]
        frame_id: FrameId,
        /// Message data.
        message: Value,
        /// Origin the receiving document must have.
        #[serde(rename = "targetOrigin")]
        target_origin: String,
    },
}

// ============================================================================
// Tests
// ============================================================================
