//! Isolation configuration.
//!
//! The only knob that changes key semantics is [`FrameSiteMode`]: when it is
//! [`FrameSiteMode::CollapseIntoTopSite`], every key behaves as if its frame
//! site were its top site. The mode is resolved once (from a config file and
//! environment) and then passed explicitly to each key operation.
//!
//! Recognized environment variables (applied on top of the file):
//! - `NETISO_COLLAPSE_FRAME_SITE` = `1|true|on|yes` / `0|false|off|no`
//! - `NETISO_STANDARD_SCHEMES` = comma-separated extra standard schemes
//!
//! Unrecognized values are ignored.

use crate::error::ConfigError;
use crate::site::SchemeRegistry;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Environment variable toggling [`FrameSiteMode::CollapseIntoTopSite`].
pub const ENV_COLLAPSE_FRAME_SITE: &str = "NETISO_COLLAPSE_FRAME_SITE";
/// Environment variable listing extra standard schemes.
pub const ENV_STANDARD_SCHEMES: &str = "NETISO_STANDARD_SCHEMES";

/// How a key's frame site participates in comparison, rendering and
/// serialization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameSiteMode {
    /// The frame site is used as stored.
    #[default]
    Separate,
    /// The frame site is replaced by the top site.
    #[serde(alias = "collapse")]
    CollapseIntoTopSite,
}

impl FrameSiteMode {
    /// Both modes, for exercising behavior under each.
    pub const ALL: [Self; 2] = [Self::Separate, Self::CollapseIntoTopSite];

    /// Mode for a boolean "collapse frame site into top site" flag.
    #[inline]
    #[must_use]
    pub const fn from_collapse_flag(collapse: bool) -> Self {
        if collapse {
            Self::CollapseIntoTopSite
        } else {
            Self::Separate
        }
    }

    /// Whether frame sites collapse into top sites.
    #[inline]
    #[must_use]
    pub const fn collapses(self) -> bool {
        matches!(self, Self::CollapseIntoTopSite)
    }
}

impl fmt::Display for FrameSiteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Separate => "separate",
            Self::CollapseIntoTopSite => "collapse_into_top_site",
        })
    }
}

impl FromStr for FrameSiteMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "separate" => Ok(Self::Separate),
            "collapse" | "collapse_into_top_site" => Ok(Self::CollapseIntoTopSite),
            _ => Err(ConfigError::UnknownMode(s.to_owned())),
        }
    }
}

/// Resolved isolation settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationConfig {
    /// Frame-site mode applied to every key operation.
    pub frame_site_mode: FrameSiteMode,
    /// Schemes treated as standard in addition to the built-in ones.
    pub extra_standard_schemes: Vec<String>,
}

impl IsolationConfig {
    /// Defaults plus environment overrides.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Read a config file (`.json` / `.cbor`), then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let cfg: Self = crate::io::read_auto(path)
            .with_context(|| format!("loading isolation config {}", path.display()))?;
        Ok(cfg.with_env_overrides())
    }

    /// Write this config (`.cbor` by extension, JSON otherwise).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        crate::io::write_auto(path, self)
    }

    /// Merge overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Merge overrides from an arbitrary variable lookup.
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_COLLAPSE_FRAME_SITE) {
            match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => {
                    self.frame_site_mode = FrameSiteMode::CollapseIntoTopSite;
                }
                "0" | "false" | "off" | "no" => self.frame_site_mode = FrameSiteMode::Separate,
                other => debug!(value = other, "ignoring {ENV_COLLAPSE_FRAME_SITE}"),
            }
        }
        if let Some(v) = lookup(ENV_STANDARD_SCHEMES) {
            for scheme in v.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                if !self.extra_standard_schemes.iter().any(|s| s.eq_ignore_ascii_case(scheme)) {
                    self.extra_standard_schemes.push(scheme.to_owned());
                }
            }
        }
        self
    }

    /// Mode to pass to key operations.
    #[inline]
    #[must_use]
    pub const fn mode(&self) -> FrameSiteMode {
        self.frame_site_mode
    }

    /// Scheme registry with the configured extra schemes.
    pub fn scheme_registry(&self) -> Result<SchemeRegistry, ConfigError> {
        let mut reg = SchemeRegistry::new();
        for scheme in &self.extra_standard_schemes {
            reg.register(scheme)?;
        }
        Ok(reg)
    }
}
