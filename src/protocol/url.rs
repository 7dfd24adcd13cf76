//! Embed URL construction.
//!
//! Maps a [`ConnectionConfig`] and a [`DocumentRequest`] to the iframe
//! `src`:
//!
//! ```text
//! https://{host}/api/embed?idEnt=1&uai=2&userId=10&fileId=10&readOnly
//! ```
//!
//! # Query Rules
//!
//! | Value | Serialized as |
//! |-------|---------------|
//! | non-empty string | `key=value` (percent-encoded) |
//! | `true` | `key` |
//! | `false` / absent | omitted |
//!
//! Keys always appear in the order `idEnt, uai, userId, fileId, title,
//! template, readOnly`.

// ============================================================================
// Imports
// ============================================================================

use url::Url;
use urlencoding::encode;

use crate::embed::{ConnectionConfig, DocumentRequest};
use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Path of the embed entry point on every environment.
pub const EMBED_PATH: &str = "/api/embed";

// ============================================================================
// QueryParam
// ============================================================================

/// A single query entry before serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryParam<'a> {
    /// `key=value`.
    Text(&'static str, &'a str),
    /// Bare `key` when `true`, nothing when `false`.
    Flag(&'static str, bool),
}

impl QueryParam<'_> {
    /// Appends this entry to `query`, if it is not omitted.
    fn write_to(self, query: &mut Vec<String>) {
        match self {
            Self::Text(_, "") => {}
            Self::Text(key, value) => query.push(format!("{key}={}", encode(value))),
            Self::Flag(key, true) => query.push(key.to_string()),
            Self::Flag(_, false) => {}
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Builds the iframe URL for a connection.
///
/// Pure: neither input is modified and no host is touched.
///
/// # Errors
///
/// - [`Error::InvalidArgument`] if the request is malformed
/// - [`Error::Protocol`] if the result is not an absolute URL
pub fn build_url(config: &ConnectionConfig, request: &DocumentRequest) -> Result<String> {
    request.validate()?;

    let mut params = vec![
        QueryParam::Text("idEnt", &config.id_ent),
        QueryParam::Text("uai", &config.uai),
        QueryParam::Text("userId", &config.user_id),
    ];

    let read_only = match request {
        DocumentRequest::Load { file_id, read_only } => {
            params.push(QueryParam::Text("fileId", file_id));
            read_only.unwrap_or(config.read_only)
        }
        DocumentRequest::Creation { title, template } => {
            params.push(QueryParam::Text("title", title));
            if let Some(template) = template.as_deref().filter(|t| !t.is_empty()) {
                params.push(QueryParam::Text("template", template));
            }
            config.read_only
        }
    };
    params.push(QueryParam::Flag("readOnly", read_only));

    let mut query = Vec::with_capacity(params.len());
    for param in params {
        param.write_to(&mut query);
    }

    let raw = format!(
        "https://{}{}?{}",
        config.env.host(),
        EMBED_PATH,
        query.join("&")
    );

    // Url keeps bare flags intact; parsing only guards against a malformed host.
    Url::parse(&raw).map_err(|e| Error::protocol(format!("invalid embed URL {raw}: {e}")))?;

    Ok(raw)
}

/// Returns the origin (`scheme://host[:port]`) of an embed URL.
///
/// Used as the `targetOrigin` for messages posted into the iframe.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if `url` cannot be parsed.
pub fn origin_of(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| Error::protocol(format!("invalid URL {url}: {e}")))?;
    Ok(parsed.origin().ascii_serialization())
}

// ============================================================================
// Tests
// ============================================================================
