//! Typed errors at the crate boundary.
//!
//! File-level helpers ([`crate::io`], [`crate::config::IsolationConfig::load`])
//! return `anyhow::Result` and wrap these with context; everything that a
//! cache or pool calls on a hot path returns one of the enums below.

use thiserror::Error;

/// Failure to turn text into a [`crate::Site`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SiteError {
    /// The text is not an absolute URL.
    #[error("invalid site URL {input:?}: {source}")]
    InvalidUrl {
        /// Offending input.
        input: String,
        /// Parser diagnosis.
        #[source]
        source: url::ParseError,
    },
}

/// Failure to persist or restore a [`crate::PartitionKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Transient keys (nonce-bearing or opaque-site-bearing) are never persisted.
    #[error("transient partition keys cannot be persisted")]
    Transient,
    /// Persisted keys are lists; anything else is rejected.
    #[error("persisted partition key must be a list, got {0}")]
    NotAList(&'static str),
    /// Lists must hold zero or two entries.
    #[error("persisted partition key must hold 0 or 2 sites, got {0}")]
    WrongLength(usize),
    /// A list entry was not a string.
    #[error("persisted site #{0} is not a string")]
    NotAString(usize),
    /// A list entry did not parse as a site.
    #[error("persisted site #{index} is invalid: {source}")]
    InvalidSite {
        /// Position in the list.
        index: usize,
        /// Parse failure.
        #[source]
        source: SiteError,
    },
    /// A list entry reconstructed as an opaque site.
    #[error("persisted site #{0} is opaque")]
    OpaqueSite(usize),
}

/// Invalid configuration input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Unrecognised frame-site mode name.
    #[error("unknown frame-site mode {0:?} (expected `separate` or `collapse`)")]
    UnknownMode(String),
    /// Scheme names must be non-empty ASCII alphanumerics plus `+-.`, starting with a letter.
    #[error("invalid scheme name {0:?}")]
    InvalidScheme(String),
}
