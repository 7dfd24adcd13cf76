//! Handshake timing and message filtering options.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use cantoo_embed::EmbedOptions;
//!
//! let options = EmbedOptions::new()
//!     .with_load_timeout(Duration::from_secs(30))
//!     .with_origin_check(false);
//!
//! assert_eq!(options.connect_timeout, Duration::from_secs(300));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Time allowed for the editor's first `ready` (5 minutes).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Time allowed for `ready` after a document reload.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Time allowed for the editor to acknowledge a close request.
pub const DEFAULT_DESTROY_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// EmbedOptions
// ============================================================================

/// Tunables shared by every connection an [`Embed`](super::Embed) opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedOptions {
    /// Deadline for the initial `ready`.
    pub connect_timeout: Duration,

    /// Deadline for `ready` after [`load_document`](crate::Connection::load_document).
    pub load_timeout: Duration,

    /// Deadline for `destroyed` after a close request.
    pub destroy_timeout: Duration,

    /// Drop window messages whose origin is not the editor's.
    ///
    /// Messages with an unknown (empty) origin are always accepted.
    pub verify_origin: bool,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            destroy_timeout: DEFAULT_DESTROY_TIMEOUT,
            verify_origin: true,
        }
    }
}

impl EmbedOptions {
    /// Creates options with the default timeouts.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the connect deadline.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the load deadline.
    #[inline]
    #[must_use]
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Sets the destroy deadline.
    #[inline]
    #[must_use]
    pub fn with_destroy_timeout(mut self, timeout: Duration) -> Self {
        self.destroy_timeout = timeout;
        self
    }

    /// Enables or disables origin filtering.
    #[inline]
    #[must_use]
    pub fn with_origin_check(mut self, verify: bool) -> Self {
        self.verify_origin = verify;
        self
    }

    /// Checks every deadline is non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first zero timeout.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("connect_timeout", self.connect_timeout),
            ("load_timeout", self.load_timeout),
            ("destroy_timeout", self.destroy_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::config(format!("{name} must be greater than zero")));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
