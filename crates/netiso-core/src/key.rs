//! Network partition keys.
//!
//! A [`PartitionKey`] is either **empty** or **fully populated** with a
//! `(top_site, frame_site)` pair and an optional [`Nonce`]. The pair is
//! stored as one optional field so a half-populated key cannot exist.
//!
//! Every derived operation takes a [`FrameSiteMode`]. Under
//! [`FrameSiteMode::CollapseIntoTopSite`] the *effective* frame site is the
//! top site; the stored frame site is kept so the same key behaves
//! correctly if it is later used in [`FrameSiteMode::Separate`].
//!
//! ## Transience
//! A key is transient when it is empty, carries a nonce, or has an opaque
//! site in its effective view. Transient keys have an empty cache string and
//! are refused by [`PartitionKey::to_value`]: an ephemeral partition must
//! never be resurrected from disk after a restart.
//!
//! ## Persisted form
//! - empty key → `[]`
//! - non-transient key → `["<top>", "<effective frame>"]`
//!
//! [`PartitionKey::from_value`] accepts exactly these two shapes.

use crate::config::FrameSiteMode;
use crate::error::KeyError;
use crate::nonce::Nonce;
use crate::site::{SchemeRegistry, Site};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt::{self, Write as _};
use std::hash::{Hash, Hasher};
use tracing::debug;

/// Debug rendering of the empty key.
const EMPTY_DEBUG_STRING: &str = "null null";

#[derive(Clone, Debug)]
struct SitePair {
    top: Site,
    frame: Site,
}

/// Identity used to double-key shared network state.
///
/// Comparison is mode-dependent, so this type deliberately has no
/// `PartialEq`/`Ord`; use [`PartitionKey::eq_in`], [`PartitionKey::cmp_in`]
/// or key maps by [`PartitionKey::effective`].
#[derive(Clone, Debug, Default)]
pub struct PartitionKey {
    sites: Option<SitePair>,
    nonce: Option<Nonce>,
}

impl PartitionKey {
    /// The empty key.
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            sites: None,
            nonce: None,
        }
    }

    /// Fully populated key without a nonce.
    #[must_use]
    pub const fn new(top_frame_site: Site, frame_site: Site) -> Self {
        Self::with_nonce(top_frame_site, frame_site, None)
    }

    /// Fully populated key, optionally scoped to `nonce`.
    #[must_use]
    pub const fn with_nonce(top_frame_site: Site, frame_site: Site, nonce: Option<Nonce>) -> Self {
        Self {
            sites: Some(SitePair {
                top: top_frame_site,
                frame: frame_site,
            }),
            nonce,
        }
    }

    /// A fresh key whose top and frame site are one newly minted opaque site.
    ///
    /// Never equal to any other key, including other transient keys.
    #[must_use]
    pub fn create_transient() -> Self {
        let site = Site::new_opaque();
        Self::new(site.clone(), site)
    }

    /// Copy of this key with the stored frame site replaced.
    ///
    /// Top site and nonce are kept. An empty key has no top site to keep and
    /// is returned unchanged.
    #[must_use]
    pub fn create_with_new_frame_site(&self, frame_site: Site) -> Self {
        match &self.sites {
            Some(pair) => Self::with_nonce(pair.top.clone(), frame_site, self.nonce),
            None => Self::empty(),
        }
    }

    /// `(top, effective frame)` under `mode`.
    fn view(&self, mode: FrameSiteMode) -> Option<(&Site, &Site)> {
        self.sites.as_ref().map(|pair| {
            let frame = if mode.collapses() { &pair.top } else { &pair.frame };
            (&pair.top, frame)
        })
    }

    /// True iff no sites are set.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.sites.is_none()
    }

    /// True iff both sites are set.
    #[inline]
    #[must_use]
    pub const fn is_fully_populated(&self) -> bool {
        self.sites.is_some()
    }

    /// Whether this key must never be persisted or used as a stable identity.
    #[must_use]
    pub fn is_transient(&self, mode: FrameSiteMode) -> bool {
        match self.view(mode) {
            None => true,
            Some((top, frame)) => self.nonce.is_some() || top.is_opaque() || frame.is_opaque(),
        }
    }

    /// Top-level site, `None` for the empty key.
    #[inline]
    #[must_use]
    pub fn top_frame_site(&self) -> Option<&Site> {
        self.sites.as_ref().map(|p| &p.top)
    }

    /// Effective frame site under `mode`, `None` for the empty key.
    #[must_use]
    pub fn frame_site(&self, mode: FrameSiteMode) -> Option<&Site> {
        self.view(mode).map(|(_, frame)| frame)
    }

    /// Stored frame site, regardless of mode.
    #[inline]
    #[must_use]
    pub fn raw_frame_site(&self) -> Option<&Site> {
        self.sites.as_ref().map(|p| &p.frame)
    }

    /// Nonce, if this key is nonce-scoped.
    #[inline]
    #[must_use]
    pub const fn nonce(&self) -> Option<Nonce> {
        self.nonce
    }

    /// Equality of effective views: sites, then nonce.
    #[must_use]
    pub fn eq_in(&self, other: &Self, mode: FrameSiteMode) -> bool {
        self.view(mode) == other.view(mode) && self.nonce == other.nonce
    }

    /// Total order of effective views.
    ///
    /// Empty sorts first; populated keys compare by top site, then frame
    /// site, then nonce (absent before present).
    #[must_use]
    pub fn cmp_in(&self, other: &Self, mode: FrameSiteMode) -> Ordering {
        (self.view(mode), self.nonce).cmp(&(other.view(mode), other.nonce))
    }

    /// Owned effective view implementing `Eq`, `Ord` and `Hash`.
    #[must_use]
    pub fn effective(&self, mode: FrameSiteMode) -> EffectiveKey {
        EffectiveKey(Self {
            sites: self.view(mode).map(|(top, frame)| SitePair {
                top: top.clone(),
                frame: frame.clone(),
            }),
            nonce: self.nonce,
        })
    }

    /// Cache-partition string: `"<top> <frame>"`, or empty for transient keys.
    #[must_use]
    pub fn to_cache_string(&self, mode: FrameSiteMode) -> String {
        match self.view(mode) {
            Some((top, frame)) if !self.is_transient(mode) => {
                format!("{} {}", top.serialize(), frame.serialize())
            }
            _ => String::new(),
        }
    }

    /// Human-readable rendering, produced even for transient keys.
    #[must_use]
    pub fn to_debug_string(&self, mode: FrameSiteMode) -> String {
        let mut out = match self.view(mode) {
            None => EMPTY_DEBUG_STRING.to_owned(),
            Some((top, frame)) => format!("{} {}", top.debug_string(), frame.debug_string()),
        };
        if let Some(nonce) = self.nonce {
            let _ = write!(out, " (with nonce {nonce})");
        }
        out
    }

    /// Persisted form. Fails with [`KeyError::Transient`] for populated
    /// transient keys; the empty key persists as `[]`.
    pub fn to_value(&self, mode: FrameSiteMode) -> Result<Value, KeyError> {
        match self.view(mode) {
            None => Ok(Value::Array(Vec::new())),
            Some(_) if self.is_transient(mode) => {
                debug!(key = %self.to_debug_string(mode), "refusing to persist transient key");
                Err(KeyError::Transient)
            }
            Some((top, frame)) => Ok(Value::Array(vec![
                Value::String(top.serialize()),
                Value::String(frame.serialize()),
            ])),
        }
    }

    /// Restore a key from its persisted form.
    ///
    /// Rejects anything [`PartitionKey::to_value`] cannot produce: non-lists,
    /// lists of length other than 0 or 2, non-string entries, entries that
    /// are not URLs, and entries that normalize to opaque sites.
    pub fn from_value(value: &Value, schemes: &SchemeRegistry) -> Result<Self, KeyError> {
        parse_value(value, schemes).map_err(|err| {
            debug!(%value, %err, "rejecting persisted partition key");
            err
        })
    }
}

fn parse_value(value: &Value, schemes: &SchemeRegistry) -> Result<PartitionKey, KeyError> {
    let list = match value {
        Value::Array(list) => list,
        other => return Err(KeyError::NotAList(value_kind(other))),
    };
    match list.as_slice() {
        [] => Ok(PartitionKey::empty()),
        [top, frame] => Ok(PartitionKey::new(
            persisted_site(0, top, schemes)?,
            persisted_site(1, frame, schemes)?,
        )),
        other => Err(KeyError::WrongLength(other.len())),
    }
}

fn persisted_site(index: usize, value: &Value, schemes: &SchemeRegistry) -> Result<Site, KeyError> {
    let text = value.as_str().ok_or(KeyError::NotAString(index))?;
    let site = schemes
        .deserialize_site(text)
        .map_err(|source| KeyError::InvalidSite { index, source })?;
    if site.is_opaque() {
        return Err(KeyError::OpaqueSite(index));
    }
    Ok(site)
}

const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "dictionary",
    }
}

/// A [`PartitionKey`] with a frame-site mode already applied.
///
/// Suitable as a `BTreeMap`/`HashMap` key: `Eq`, `Ord` and `Hash` agree with
/// [`PartitionKey::eq_in`] / [`PartitionKey::cmp_in`] under the mode it was
/// built with. `Display` renders the debug string.
#[derive(Clone, Debug)]
pub struct EffectiveKey(PartitionKey);

impl EffectiveKey {
    // The stored frame site is already the effective one.
    const MODE: FrameSiteMode = FrameSiteMode::Separate;

    /// Whether this key must never be persisted.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.0.is_transient(Self::MODE)
    }

    /// See [`PartitionKey::to_cache_string`].
    #[must_use]
    pub fn to_cache_string(&self) -> String {
        self.0.to_cache_string(Self::MODE)
    }

    /// See [`PartitionKey::to_debug_string`].
    #[must_use]
    pub fn to_debug_string(&self) -> String {
        self.0.to_debug_string(Self::MODE)
    }

    /// See [`PartitionKey::to_value`].
    pub fn to_value(&self) -> Result<Value, KeyError> {
        self.0.to_value(Self::MODE)
    }

    /// The underlying key, with its frame site set to the effective one.
    #[inline]
    #[must_use]
    pub const fn as_key(&self) -> &PartitionKey {
        &self.0
    }

    /// Unwrap into the underlying key.
    #[inline]
    #[must_use]
    pub fn into_key(self) -> PartitionKey {
        self.0
    }
}

impl PartialEq for EffectiveKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_in(&other.0, Self::MODE)
    }
}

impl Eq for EffectiveKey {}

impl PartialOrd for EffectiveKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EffectiveKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp_in(&other.0, Self::MODE)
    }
}

impl Hash for EffectiveKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.view(Self::MODE).hash(state);
        self.0.nonce.hash(state);
    }
}

impl fmt::Display for EffectiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_debug_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::{BTreeSet, HashSet};

    fn a() -> Site {
        Site::new("https://a.test")
    }

    fn b() -> Site {
        Site::new("https://b.test")
    }

    #[test]
    fn default_is_empty() {
        let key = PartitionKey::default();
        assert!(key.is_empty());
        assert!(!key.is_fully_populated());
        assert!(key.top_frame_site().is_none());
        assert!(key.raw_frame_site().is_none());
        assert!(key.nonce().is_none());
        for mode in FrameSiteMode::ALL {
            assert!(key.frame_site(mode).is_none());
            assert!(key.is_transient(mode));
        }
    }

    #[test]
    fn collapse_keeps_raw_frame_site() {
        let key = PartitionKey::new(a(), b());
        assert_eq!(key.raw_frame_site(), Some(&b()));
        assert_eq!(key.frame_site(FrameSiteMode::Separate), Some(&b()));
        assert_eq!(key.frame_site(FrameSiteMode::CollapseIntoTopSite), Some(&a()));
    }

    #[test]
    fn effective_key_drops_frame_under_collapse() {
        let eff = PartitionKey::new(a(), b()).effective(FrameSiteMode::CollapseIntoTopSite);
        assert_eq!(eff.as_key().raw_frame_site(), Some(&a()));
        assert_eq!(eff.to_cache_string(), "https://a.test https://a.test");
        assert_eq!(eff.to_string(), "https://a.test https://a.test");
    }

    #[test]
    fn effective_keys_dedupe_in_sets() {
        let keys = [
            PartitionKey::new(a(), a()),
            PartitionKey::new(a(), b()),
            PartitionKey::new(a(), b()),
            PartitionKey::empty(),
        ];

        let separate: HashSet<_> = keys.iter().map(|k| k.effective(FrameSiteMode::Separate)).collect();
        assert_eq!(separate.len(), 3);

        let collapsed: BTreeSet<_> = keys
            .iter()
            .map(|k| k.effective(FrameSiteMode::CollapseIntoTopSite))
            .collect();
        assert_eq!(collapsed.len(), 2);
        assert!(collapsed.iter().next().unwrap().as_key().is_empty());

        let unwrapped = collapsed.into_iter().last().unwrap().into_key();
        assert_eq!(unwrapped.raw_frame_site(), Some(&a()));
    }

    #[test]
    fn new_frame_site_on_empty_key_stays_empty() {
        let key = PartitionKey::empty().create_with_new_frame_site(a());
        assert!(key.is_empty());
    }

    #[test]
    fn new_frame_site_preserves_nonce() {
        let nonce = Nonce::create();
        let key = PartitionKey::with_nonce(a(), a(), Some(nonce)).create_with_new_frame_site(b());
        assert_eq!(key.nonce(), Some(nonce));
        assert_eq!(key.raw_frame_site(), Some(&b()));
    }

    #[test]
    fn from_value_reports_rejection_reason() {
        let reg = SchemeRegistry::new();
        assert_eq!(
            PartitionKey::from_value(&json!("https://a.test"), &reg).unwrap_err(),
            KeyError::NotAList("string")
        );
        assert_eq!(
            PartitionKey::from_value(&json!({}), &reg).unwrap_err(),
            KeyError::NotAList("dictionary")
        );
        assert_eq!(
            PartitionKey::from_value(&json!(["https://a.test"]), &reg).unwrap_err(),
            KeyError::WrongLength(1)
        );
        assert_eq!(
            PartitionKey::from_value(&json!(["https://a.test", 7]), &reg).unwrap_err(),
            KeyError::NotAString(1)
        );
        assert!(matches!(
            PartitionKey::from_value(&json!(["not-a-url", "https://a.test"]), &reg),
            Err(KeyError::InvalidSite { index: 0, .. })
        ));
        assert_eq!(
            PartitionKey::from_value(&json!(["https://a.test", "data:text/html,x"]), &reg)
                .unwrap_err(),
            KeyError::OpaqueSite(1)
        );
    }

    #[test]
    fn to_value_under_collapse_writes_top_twice() {
        let key = PartitionKey::new(a(), b());
        assert_eq!(
            key.to_value(FrameSiteMode::CollapseIntoTopSite).unwrap(),
            json!(["https://a.test", "https://a.test"])
        );
        assert_eq!(
            key.to_value(FrameSiteMode::Separate).unwrap(),
            json!(["https://a.test", "https://b.test"])
        );
    }
}
