//! Persistence helpers for partition keys and configuration.
//!
//! JSON and CBOR read/write utilities with extension-based auto-detection.
//! Unknown/missing extensions are rejected for reads and default to JSON
//! for writes.
//!
//! The main payload is [`PartitionKeyStore`]: a versioned list of persisted
//! key values (the output of [`PartitionKey::to_value`]), the shape a
//! server-properties file or a disk cache index keeps across restarts.
//! Transient keys never enter a store, and entries that fail
//! [`PartitionKey::from_value`] on load are dropped with a warning rather
//! than failing the whole file.

use crate::config::FrameSiteMode;
use crate::error::KeyError;
use crate::key::PartitionKey;
use crate::site::SchemeRegistry;
use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Cursor};
use std::path::Path;
use tracing::warn;

/// Format version for [`PartitionKeyStore`].
pub const STORE_VERSION: u32 = 1;

/// Versioned collection of persisted partition keys.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionKeyStore {
    /// Schema version; must equal [`STORE_VERSION`] on load.
    pub version: u32,
    /// Persisted key values, in insertion order, without duplicates.
    pub keys: Vec<Value>,
}

impl Default for PartitionKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PartitionKeyStore {
    /// Empty store at the current version.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            version: STORE_VERSION,
            keys: Vec::new(),
        }
    }

    /// Persist `key` under `mode`.
    ///
    /// Returns `Ok(false)` if an equal persisted value is already present and
    /// [`KeyError::Transient`] if the key may not be persisted.
    pub fn insert(&mut self, key: &PartitionKey, mode: FrameSiteMode) -> Result<bool, KeyError> {
        let value = key.to_value(mode)?;
        if self.keys.contains(&value) {
            return Ok(false);
        }
        self.keys.push(value);
        Ok(true)
    }

    /// Build a store from `keys`, skipping transient ones.
    ///
    /// Returns the store and the number of keys skipped.
    #[must_use]
    pub fn from_keys<'a, I>(keys: I, mode: FrameSiteMode) -> (Self, usize)
    where
        I: IntoIterator<Item = &'a PartitionKey>,
    {
        let mut store = Self::new();
        let mut skipped = 0usize;
        for key in keys {
            if store.insert(key, mode).is_err() {
                skipped += 1;
            }
        }
        (store, skipped)
    }

    /// Restore every valid entry; invalid entries are logged and dropped.
    #[must_use]
    pub fn restore(&self, schemes: &SchemeRegistry) -> Vec<PartitionKey> {
        self.keys
            .iter()
            .enumerate()
            .filter_map(|(i, v)| match PartitionKey::from_value(v, schemes) {
                Ok(key) => Some(key),
                Err(err) => {
                    warn!(entry = i, %err, "dropping invalid persisted partition key");
                    None
                }
            })
            .collect()
    }

    /// Number of stored entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the store holds no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/* ------------------------------ key store I/O ----------------------------- */

/// Auto-detect read of a [`PartitionKeyStore`] (`.json` / `.cbor`).
///
/// Fails if the stored version differs from [`STORE_VERSION`].
pub fn read_store_auto<P: AsRef<Path>>(path: P) -> Result<PartitionKeyStore> {
    let path = path.as_ref();
    let store: PartitionKeyStore =
        read_auto(path).with_context(|| format!("reading key store {}", display(path)))?;
    if store.version != STORE_VERSION {
        bail!(
            "unsupported key store version {} in {} (expected {})",
            store.version,
            display(path),
            STORE_VERSION
        );
    }
    Ok(store)
}

/// Auto-detect write of a [`PartitionKeyStore`] (defaults to **JSON**).
pub fn write_store_auto<P: AsRef<Path>>(path: P, store: &PartitionKeyStore) -> Result<()> {
    let path = path.as_ref();
    write_auto(path, store).with_context(|| format!("writing key store {}", display(path)))
}

/* --------------------------- generic JSON/CBOR ---------------------------- */

/// Ensure the parent directory for a file exists (no-op if none).
fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating parent directory {}", display(path)))?;
        }
    }
    Ok(())
}

/// Read any `T` from **JSON**.
pub fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", display(path)))?;
    serde_json::from_reader(BufReader::new(f)).with_context(|| "deserialize JSON")
}

/// Write any `T` to **JSON** (pretty).
pub fn write_json<T: Serialize, P: AsRef<Path>>(path: P, v: &T) -> Result<()> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;
    let f = File::create(path).with_context(|| format!("create {}", display(path)))?;
    serde_json::to_writer_pretty(BufWriter::new(f), v).with_context(|| "serialize JSON")?;
    Ok(())
}

/// Read any `T` from **CBOR**.
pub fn read_cbor<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", display(path)))?;
    let mut rdr = BufReader::new(f);
    ciborium::de::from_reader(&mut rdr).with_context(|| "deserialize CBOR")
}

/// Write any `T` to **CBOR**.
pub fn write_cbor<T: Serialize, P: AsRef<Path>>(path: P, v: &T) -> Result<()> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;
    let f = File::create(path).with_context(|| format!("create {}", display(path)))?;
    let mut w = BufWriter::new(f);
    ciborium::ser::into_writer(v, &mut w).with_context(|| "serialize CBOR")?;
    Ok(())
}

/// Auto-detect read by extension `.json` / `.cbor` (case-insensitive).
pub fn read_auto<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    match ext_lower(path.as_ref()).as_deref() {
        Some("json") => read_json(path),
        Some("cbor") => read_cbor(path),
        Some(other) => Err(anyhow!(
            "unsupported extension: {} (supported: .json, .cbor)",
            other
        )),
        None => Err(anyhow!("path has no extension (expected .json or .cbor)")),
    }
}

/// Auto-detect write (defaults to **JSON** if unknown or missing).
pub fn write_auto<T: Serialize, P: AsRef<Path>>(path: P, v: &T) -> Result<()> {
    match ext_lower(path.as_ref()).as_deref() {
        Some("cbor") => write_cbor(path, v),
        _ => write_json(path, v),
    }
}

/// Serialize any `T: Serialize` to **CBOR bytes** using `ciborium`.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf).with_context(|| "serialize CBOR (to_cbor)")?;
    Ok(buf)
}

/// Deserialize any `T: DeserializeOwned` from **CBOR bytes** using `ciborium`.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut cur = Cursor::new(bytes);
    let v = ciborium::de::from_reader(&mut cur).with_context(|| "deserialize CBOR (from_cbor)")?;
    Ok(v)
}

/// Return the lowercase extension (without dot) if present.
fn ext_lower(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Human-friendly path display for error messages.
fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
