//! Builder pattern for embed configuration.
//!
//! Provides a fluent API for configuring and creating [`Embed`] instances.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use cantoo_embed::Embed;
//! use cantoo_embed::host::MemoryHost;
//!
//! # fn example() -> cantoo_embed::Result<()> {
//! let embed = Embed::builder()
//!     .host(MemoryHost::new())
//!     .load_timeout(Duration::from_secs(30))
//!     .build()?;
//! # let _ = embed;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::host::Host;

use super::core::Embed;
use super::options::EmbedOptions;

// ============================================================================
// EmbedBuilder
// ============================================================================

/// Builder for configuring an [`Embed`] instance.
///
/// Use [`Embed::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct EmbedBuilder {
    /// Host page implementation.
    host: Option<Arc<dyn Host>>,
    /// Timeouts and filtering.
    options: EmbedOptions,
}

impl fmt::Debug for EmbedBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbedBuilder")
            .field("has_host", &self.host.is_some())
            .field("options", &self.options)
            .finish()
    }
}

// ============================================================================
// EmbedBuilder Implementation
// ============================================================================

impl EmbedBuilder {
    /// Creates a builder with default options and no host.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the host page implementation.
    #[inline]
    #[must_use]
    pub fn host(mut self, host: impl Host) -> Self {
        self.host = Some(Arc::new(host));
        self
    }

    /// Sets an already shared host.
    #[inline]
    #[must_use]
    pub fn shared_host(mut self, host: Arc<dyn Host>) -> Self {
        self.host = Some(host);
        self
    }

    /// Replaces every option at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: EmbedOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the deadline for the initial `ready`.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Sets the deadline for `ready` after a reload.
    #[inline]
    #[must_use]
    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.options.load_timeout = timeout;
        self
    }

    /// Sets the deadline for the close acknowledgement.
    #[inline]
    #[must_use]
    pub fn destroy_timeout(mut self, timeout: Duration) -> Self {
        self.options.destroy_timeout = timeout;
        self
    }

    /// Enables or disables origin filtering of window messages.
    #[inline]
    #[must_use]
    pub fn verify_origin(mut self, verify: bool) -> Self {
        self.options.verify_origin = verify;
        self
    }

    /// Builds the embed with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no host is set
    /// - [`Error::Config`] if a timeout is zero
    pub fn build(self) -> Result<Embed> {
        let host = self.host.ok_or_else(|| {
            Error::config(
                "Host is required. Use .host() to set it.\n\
                 Example: Embed::builder().host(MemoryHost::new())",
            )
        })?;
        self.options.validate()?;

        Ok(Embed::new(host, self.options))
    }
}

// ============================================================================
// Tests
// ============================================================================
