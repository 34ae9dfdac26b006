//! Site identity: scheme plus registrable domain, or an opaque token.
//!
//! A [`Site`] is what partition keys are made of. Two tuple sites are equal
//! iff their normalized `(scheme, host)` match; `https://www.a.test:8443/x`
//! and `https://a.test/` are the same site. Anything without a stable
//! normalized form (a `data:` URL, an unregistered scheme, an unparseable
//! string) becomes an **opaque** site carrying a fresh [`Nonce`], so two
//! opaque sites built from the very same input never compare equal.
//!
//! Which schemes are "standard" (and therefore produce tuple sites) is
//! decided by a [`SchemeRegistry`] passed in by the caller.

use crate::error::{ConfigError, SiteError};
use crate::nonce::Nonce;
use crate::suffix::registrable_domain;
use std::collections::BTreeSet;
use std::fmt;
use tracing::trace;
use url::Url;

/// Schemes that always produce tuple sites.
const BUILTIN_STANDARD_SCHEMES: &[&str] = &["file", "ftp", "http", "https", "ws", "wss"];

/// Serialized form of every opaque site.
const OPAQUE_SERIALIZATION: &str = "null";

/// Normalized site identity.
///
/// Ordering is by scheme, then host, then opaque token (absent first). An
/// anonymous opaque site has an empty scheme and host and therefore sorts
/// before every tuple site; among opaque sites the order follows their
/// random tokens, which is stable for the lifetime of the value.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Site {
    scheme: String,
    host: String,
    opaque: Option<Nonce>,
}

impl Site {
    /// Build a site from URL text using the built-in standard schemes.
    ///
    /// Never fails: text that does not parse yields an opaque site.
    #[must_use]
    pub fn new(url: &str) -> Self {
        SchemeRegistry::default().site(url)
    }

    /// Mint an anonymous opaque site.
    #[must_use]
    pub fn new_opaque() -> Self {
        Self {
            scheme: String::new(),
            host: String::new(),
            opaque: Some(Nonce::create()),
        }
    }

    /// Mint an opaque site that remembers `self` as its precursor
    /// (a sandboxed document of this site, for example).
    ///
    /// The result is distinct from `self` and from every other opaque site.
    #[must_use]
    pub fn derive_opaque(&self) -> Self {
        Self {
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            opaque: Some(Nonce::create()),
        }
    }

    fn tuple(scheme: &str, host: String) -> Self {
        Self {
            scheme: scheme.to_owned(),
            host,
            opaque: None,
        }
    }

    /// Whether this site has no stable normalized form.
    #[inline]
    #[must_use]
    pub const fn is_opaque(&self) -> bool {
        self.opaque.is_some()
    }

    /// Scheme of the site (or of its precursor, for opaque sites).
    #[inline]
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Registrable domain, or full host where no registrable domain applies.
    #[inline]
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Stable, non-debug serialization: `scheme://host`, or `null` if opaque.
    #[must_use]
    pub fn serialize(&self) -> String {
        if self.is_opaque() {
            OPAQUE_SERIALIZATION.to_owned()
        } else {
            format!("{}://{}", self.scheme, self.host)
        }
    }

    /// Human-readable form. For opaque sites this reveals the internal token,
    /// so distinct opaque sites always render differently.
    #[must_use]
    pub fn debug_string(&self) -> String {
        match self.opaque {
            None => self.serialize(),
            Some(token) if self.scheme.is_empty() => {
                format!("{OPAQUE_SERIALIZATION} [internally: {token} anonymous]")
            }
            Some(token) => format!(
                "{OPAQUE_SERIALIZATION} [internally: {token} derived from {}://{}]",
                self.scheme, self.host
            ),
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.debug_string())
    }
}

/// Set of schemes treated as standard (host-bearing) when building sites.
///
/// The built-in schemes (`http`, `https`, `ws`, `wss`, `ftp`, `file`) are
/// always standard; [`SchemeRegistry::register`] adds more.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchemeRegistry {
    extra: BTreeSet<String>,
}

impl SchemeRegistry {
    /// Registry with only the built-in schemes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an additional standard scheme (case-insensitive).
    pub fn register(&mut self, scheme: &str) -> Result<(), ConfigError> {
        let scheme = scheme.to_ascii_lowercase();
        if !is_valid_scheme(&scheme) {
            return Err(ConfigError::InvalidScheme(scheme));
        }
        if !BUILTIN_STANDARD_SCHEMES.contains(&scheme.as_str()) {
            self.extra.insert(scheme);
        }
        Ok(())
    }

    /// Builder form of [`SchemeRegistry::register`].
    pub fn with_scheme(mut self, scheme: &str) -> Result<Self, ConfigError> {
        self.register(scheme)?;
        Ok(self)
    }

    /// Whether `scheme` (already lower-case) produces tuple sites.
    #[must_use]
    pub fn is_standard(&self, scheme: &str) -> bool {
        BUILTIN_STANDARD_SCHEMES.contains(&scheme) || self.extra.contains(scheme)
    }

    /// Extra schemes registered on top of the built-ins, in sorted order.
    pub fn registered(&self) -> impl Iterator<Item = &str> {
        self.extra.iter().map(String::as_str)
    }

    /// Build a site from URL text. Unparseable text yields an opaque site.
    #[must_use]
    pub fn site(&self, url: &str) -> Site {
        match Url::parse(url) {
            Ok(u) => self.site_from_url(&u),
            Err(err) => {
                trace!(input = url, %err, "unparseable URL yields an opaque site");
                Site::new_opaque()
            }
        }
    }

    /// Build a site from an already-parsed URL.
    #[must_use]
    pub fn site_from_url(&self, url: &Url) -> Site {
        let scheme = url.scheme();
        if !self.is_standard(scheme) {
            return Site::new_opaque();
        }
        // WebSocket schemes share sites with their HTTP counterparts.
        let scheme = match scheme {
            "ws" => "http",
            "wss" => "https",
            other => other,
        };

        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        if scheme == "file" {
            return Site::tuple(scheme, host);
        }
        if host.is_empty() {
            return Site::new_opaque();
        }

        let host = if matches!(scheme, "http" | "https") {
            registrable_domain(&host).map_or_else(|| host.clone(), str::to_owned)
        } else {
            host
        };
        Site::tuple(scheme, host)
    }

    /// Rebuild a site from its [`Site::serialize`] form.
    ///
    /// Text that is not an absolute URL is an error; text that parses but
    /// normalizes to an opaque site (e.g. `null`-like `data:` URLs) is
    /// returned as that opaque site, and it is up to the caller to reject it.
    pub fn deserialize_site(&self, text: &str) -> Result<Site, SiteError> {
        let url = Url::parse(text).map_err(|source| SiteError::InvalidUrl {
            input: text.to_owned(),
            source,
        })?;
        Ok(self.site_from_url(&url))
    }
}

/// RFC 3986 scheme syntax on an already lower-cased name.
fn is_valid_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '-' | '.'))
}
