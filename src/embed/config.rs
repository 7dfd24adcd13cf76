//! Connection parameters and document requests.
//!
//! A [`ConnectionConfig`] describes *who* is opening the editor and *where*
//! the iframe goes; a [`DocumentRequest`] describes *what* it opens.
//!
//! # Example
//!
//! ```
//! use cantoo_embed::{ConnectionConfig, DocumentRequest};
//!
//! # fn example() -> cantoo_embed::Result<()> {
//! let config = ConnectionConfig::builder()
//!     .container("editor")
//!     .env("develop")
//!     .id_ent("1")
//!     .uai("2")
//!     .user_id("10")
//!     .build()?;
//!
//! let request = DocumentRequest::load("10", Some(true))?;
//! # let _ = (config, request);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identifiers::ContainerId;

// ============================================================================
// Environment
// ============================================================================

/// Deployment the embedded editor is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Environment {
    /// Development deployment.
    Develop,
    /// Pre-production deployment.
    Preprod,
    /// Production deployment.
    Prod,
}

impl Environment {
    /// All supported environments.
    pub const ALL: [Self; 3] = [Self::Develop, Self::Preprod, Self::Prod];

    /// Returns the host name serving this environment.
    #[inline]
    #[must_use]
    pub const fn host(&self) -> &'static str {
        match self {
            Self::Develop => "develop.cantoo.fr",
            Self::Preprod => "preprod.cantoo.fr",
            Self::Prod => "cantoo.fr",
        }
    }

    /// Returns the origin of the embedded application.
    #[must_use]
    pub fn origin(&self) -> String {
        format!("https://{}", self.host())
    }

    /// Returns the configuration name.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Develop => "develop",
            Self::Preprod => "preprod",
            Self::Prod => "prod",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "develop" => Ok(Self::Develop),
            "preprod" => Ok(Self::Preprod),
            "prod" => Ok(Self::Prod),
            other => Err(Error::invalid_environment(other)),
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Environment> for String {
    fn from(value: Environment) -> Self {
        value.as_str().to_string()
    }
}

// ============================================================================
// ConnectionConfig
// ============================================================================

/// Parameters identifying the user and the host container.
///
/// `id_ent`, `uai` and `user_id` are opaque tokens forwarded to the editor
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// Container element the iframe is appended to.
    #[serde(rename = "domElement")]
    pub container: ContainerId,

    /// Deployment environment.
    pub env: Environment,

    /// Establishment identifier.
    pub id_ent: String,

    /// School identifier (UAI).
    pub uai: String,

    /// User identifier.
    pub user_id: String,

    /// Open documents read-only unless a request says otherwise.
    #[serde(default)]
    pub read_only: bool,
}

impl ConnectionConfig {
    /// Returns a builder for a connection configuration.
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default()
    }
}

// ============================================================================
// ConnectionConfigBuilder
// ============================================================================

/// Builder for [`ConnectionConfig`].
///
/// The environment is kept as text until [`build`](Self::build) so an
/// unknown name surfaces as [`Error::InvalidEnvironment`] at that point.
#[derive(Debug, Default, Clone)]
pub struct ConnectionConfigBuilder {
    container: Option<ContainerId>,
    env: Option<String>,
    id_ent: Option<String>,
    uai: Option<String>,
    user_id: Option<String>,
    read_only: bool,
}

impl ConnectionConfigBuilder {
    /// Sets the container element handle.
    #[inline]
    #[must_use]
    pub fn container(mut self, container: impl Into<ContainerId>) -> Self {
        self.container = Some(container.into());
        self
    }

    /// Sets the environment name (`develop`, `preprod` or `prod`).
    #[inline]
    #[must_use]
    pub fn env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    /// Sets the establishment identifier.
    #[inline]
    #[must_use]
    pub fn id_ent(mut self, id_ent: impl Into<String>) -> Self {
        self.id_ent = Some(id_ent.into());
        self
    }

    /// Sets the school identifier.
    #[inline]
    #[must_use]
    pub fn uai(mut self, uai: impl Into<String>) -> Self {
        self.uai = Some(uai.into());
        self
    }

    /// Sets the user identifier.
    #[inline]
    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the default read-only flag.
    #[inline]
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Builds the configuration with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidEnvironment`] if the environment name is unknown
    /// - [`Error::Config`] if a required field is missing
    pub fn build(self) -> Result<ConnectionConfig> {
        let env = self
            .env
            .as_deref()
            .ok_or_else(|| Error::config("env is required"))?
            .parse::<Environment>()?;

        Ok(ConnectionConfig {
            container: self
                .container
                .ok_or_else(|| Error::config("container is required"))?,
            env,
            id_ent: self.id_ent.unwrap_or_default(),
            uai: self.uai.unwrap_or_default(),
            user_id: self.user_id.unwrap_or_default(),
            read_only: self.read_only,
        })
    }
}

// ============================================================================
// DocumentRequest
// ============================================================================

/// What the embedded editor should open.
///
/// Exactly one variant is active per connection; reloading always switches
/// to [`DocumentRequest::Load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentRequest {
    /// Create a new document.
    Creation {
        /// Title of the new document.
        title: String,
        /// Optional template the document starts from.
        template: Option<String>,
    },

    /// Open an existing document.
    Load {
        /// Document identifier.
        file_id: String,
        /// Overrides the connection's read-only flag when set.
        read_only: Option<bool>,
    },
}

impl DocumentRequest {
    /// Creates a validated creation request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `title` is empty.
    pub fn creation(title: impl Into<String>, template: Option<String>) -> Result<Self> {
        let request = Self::Creation {
            title: title.into(),
            template,
        };
        request.validate()?;
        Ok(request)
    }

    /// Creates a validated load request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `file_id` is empty.
    pub fn load(file_id: impl Into<String>, read_only: Option<bool>) -> Result<Self> {
        let request = Self::Load {
            file_id: file_id.into(),
            read_only,
        };
        request.validate()?;
        Ok(request)
    }

    /// Checks the request is well-formed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty title or file ID.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Creation { title, .. } if title.is_empty() => {
                Err(Error::invalid_argument("creation request needs a title"))
            }
            Self::Load { file_id, .. } if file_id.is_empty() => {
                Err(Error::invalid_argument("load request needs a fileId"))
            }
            _ => Ok(()),
        }
    }

    /// Returns the document ID for load requests.
    #[inline]
    #[must_use]
    pub fn file_id(&self) -> Option<&str> {
        match self {
            Self::Load { file_id, .. } => Some(file_id),
            Self::Creation { .. } => None,
        }
    }

    /// Returns `true` for load requests.
    #[inline]
    #[must_use]
    pub fn is_load(&self) -> bool {
        matches!(self, Self::Load { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
