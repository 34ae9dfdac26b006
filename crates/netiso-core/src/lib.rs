//! netiso-core — network partition keys for double-keying shared network state.
//!
//! A [`PartitionKey`] pairs the top-level site of a browsing context with the
//! site of the frame that issued a request (and, optionally, a [`Nonce`]).
//! Caches, socket pools and resolvers key their entries by it so that one
//! site can never observe or poison state created on behalf of another.
//!
//! This crate defines:
//! - the site identity ([`Site`], [`SchemeRegistry`]) keys are built from,
//! - the key value itself with its ordering, rendering and persisted form,
//! - the [`FrameSiteMode`] switch that collapses frame sites into top sites,
//! - JSON/CBOR helpers for storing persisted keys and loading configuration.
//!
//! ```rust
//! use netiso_core::{FrameSiteMode, PartitionKey, Site};
//!
//! let key = PartitionKey::new(Site::new("https://news.example"), Site::new("https://ads.example"));
//! assert_eq!(
//!     key.to_cache_string(FrameSiteMode::Separate),
//!     "https://news.example https://ads.example"
//! );
//! assert_eq!(
//!     key.to_cache_string(FrameSiteMode::CollapseIntoTopSite),
//!     "https://news.example https://news.example"
//! );
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![deny(missing_docs)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
// Small, explicit allowlist to keep docs readable and APIs ergonomic.
#![allow(
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::doc_markdown
)]

/// Isolation configuration (frame-site mode, extra standard schemes).
pub mod config;
/// Typed errors for sites, keys and configuration.
pub mod error;
/// JSON/CBOR persistence helpers for key stores.
pub mod io;
/// The partition key value and its effective view.
pub mod key;
/// 128-bit unguessable tokens.
pub mod nonce;
/// Site identity and scheme registration.
pub mod site;
/// Compact public-suffix table used for registrable-domain reduction.
mod suffix;

pub use config::{FrameSiteMode, IsolationConfig};
pub use error::{ConfigError, KeyError, SiteError};
pub use key::{EffectiveKey, PartitionKey};
pub use nonce::{Nonce, ParseNonceError};
pub use site::{SchemeRegistry, Site};

/// Commonly-used items for quick imports.
///
/// ```rust
/// use netiso_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        config::{FrameSiteMode, IsolationConfig},
        key::{EffectiveKey, PartitionKey},
        nonce::Nonce,
        site::{SchemeRegistry, Site},
    };
}
