//! Error types for the embed client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use cantoo_embed::{Error, Result};
//!
//! async fn example(connection: &Connection) -> Result<()> {
//!     connection.load_document("42", Some(true)).await?;
//!     connection.destroy().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::InvalidEnvironment`], [`Error::Config`], [`Error::InvalidArgument`] |
//! | Handshake | [`Error::ConnectTimeout`], [`Error::LoadTimeout`], [`Error::DestroyTimeout`] |
//! | Lifecycle | [`Error::NoActiveConnection`], [`Error::OperationInProgress`], [`Error::ConnectionClosed`] |
//! | Host | [`Error::Host`], [`Error::Protocol`], [`Error::BridgeTimeout`], [`Error::RequestTimeout`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::ChannelClosed`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Unknown deployment environment.
    ///
    /// Raised synchronously while building a configuration; no iframe is
    /// ever mounted for a configuration that fails this way.
    #[error("Invalid environment: {value:?} (expected develop, preprod or prod)")]
    InvalidEnvironment {
        /// The rejected environment name.
        value: String,
    },

    /// Configuration error.
    ///
    /// Returned when embed or connection configuration is incomplete.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid argument.
    ///
    /// Returned when a document request or call argument is malformed.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Handshake Errors
    // ========================================================================
    /// The embedded application never reported `ready` after mounting.
    #[error("Connect timeout after {timeout_ms}ms")]
    ConnectTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// The embedded application never reported `ready` after a reload.
    #[error("Load timeout after {timeout_ms}ms: file {file_id}")]
    LoadTimeout {
        /// The document that was being loaded.
        file_id: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// The embedded application never acknowledged a close request.
    #[error("Destroy timeout after {timeout_ms}ms")]
    DestroyTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// No live iframe to operate on.
    ///
    /// Returned by operations on a connection that was already destroyed.
    #[error("No active connection")]
    NoActiveConnection,

    /// Another document load is still pending on this connection.
    #[error("Operation in progress: {operation}")]
    OperationInProgress {
        /// The operation that is still pending.
        operation: String,
    },

    /// The connection was torn down while an operation was waiting.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Host Errors
    // ========================================================================
    /// A host page operation failed.
    #[error("Host error: {message}")]
    Host {
        /// Description of the host failure.
        message: String,
    },

    /// Protocol violation or unexpected response.
    ///
    /// Returned when a bridge message format is invalid.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// The page bridge did not connect in time.
    #[error("Bridge timeout after {timeout_ms}ms")]
    BridgeTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Bridge request timeout.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid environment error.
    #[inline]
    pub fn invalid_environment(value: impl Into<String>) -> Self {
        Self::InvalidEnvironment {
            value: value.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a connect timeout error.
    #[inline]
    pub fn connect_timeout(timeout_ms: u64) -> Self {
        Self::ConnectTimeout { timeout_ms }
    }

    /// Creates a load timeout error.
    #[inline]
    pub fn load_timeout(file_id: impl Into<String>, timeout_ms: u64) -> Self {
        Self::LoadTimeout {
            file_id: file_id.into(),
            timeout_ms,
        }
    }

    /// Creates a destroy timeout error.
    #[inline]
    pub fn destroy_timeout(timeout_ms: u64) -> Self {
        Self::DestroyTimeout { timeout_ms }
    }

    /// Creates an operation in progress error.
    #[inline]
    pub fn operation_in_progress(operation: impl Into<String>) -> Self {
        Self::OperationInProgress {
            operation: operation.into(),
        }
    }

    /// Creates a host error.
    #[inline]
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a bridge timeout error.
    #[inline]
    pub fn bridge_timeout(timeout_ms: u64) -> Self {
        Self::BridgeTimeout { timeout_ms }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout { .. }
                | Self::LoadTimeout { .. }
                | Self::DestroyTimeout { .. }
                | Self::BridgeTimeout { .. }
                | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NoActiveConnection
                | Self::ConnectionClosed
                | Self::ConnectTimeout { .. }
                | Self::BridgeTimeout { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed when retried with a fresh connection.
    /// Every handshake timeout tears the embed down, so retrying always
    /// means calling `connect` again.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout { .. }
                | Self::LoadTimeout { .. }
                | Self::BridgeTimeout { .. }
                | Self::RequestTimeout { .. }
                | Self::OperationInProgress { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
