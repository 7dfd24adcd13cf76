//! Embed entry point and configuration.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Embed`] | Factory opening editor connections on a host |
//! | [`EmbedBuilder`] | Fluent configuration builder |
//! | [`EmbedOptions`] | Handshake timeouts and origin filtering |
//! | [`ConnectionConfig`] | User identity and iframe placement |
//! | [`DocumentRequest`] | Document to create or load |
//! | [`Environment`] | Deployment serving the editor |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for embed configuration.
pub mod builder;

/// Connection parameters and document requests.
pub mod config;

/// Core embed implementation.
pub mod core;

/// Timeouts and filtering options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::EmbedBuilder;
pub use config::{ConnectionConfig, ConnectionConfigBuilder, DocumentRequest, Environment};
pub use core::Embed;
pub use options::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_DESTROY_TIMEOUT, DEFAULT_LOAD_TIMEOUT, EmbedOptions,
};
