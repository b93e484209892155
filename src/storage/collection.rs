//! Collection files
//!
//! In-memory view of one collection plus the helpers that load and persist
//! it as `<volume>/<name>.json`.
//!
//! ## File Format
//! ```text
//! [
//!   { "key": "lasse", "data": { "age": 30 } },
//!   { "key": "maria", "data": [1, 2, 3] }
//! ]
//! ```
//!
//! Rewrites go to `<name>.json.tmp` and are renamed over the target, so a
//! reader never observes a half-written array.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::SyncStrategy;
use crate::error::{FlickError, Result};

/// Extension of collection files
pub const COLLECTION_EXTENSION: &str = "json";

/// Longest accepted collection name
pub const MAX_COLLECTION_NAME_LEN: usize = 128;

/// One `{key, data}` entry of a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: String,

    #[serde(default)]
    pub data: Value,

    /// Any other fields stored with the record, carried through rewrites
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    pub fn new(key: impl Into<String>, data: Value) -> Self {
        Self {
            key: key.into(),
            data,
            extra: Map::new(),
        }
    }
}

/// A loaded collection: its name and records in storage order
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    name: String,
    records: Vec<Record>,
}

impl Collection {
    /// Create an empty collection
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Vec::new(),
        }
    }

    /// Decode a collection from raw file content
    ///
    /// Fails with `CorruptCollection` unless the content is a JSON array of
    /// `{key, data}` objects.
    pub fn decode(name: &str, bytes: &[u8]) -> Result<Self> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| FlickError::corrupt(name, e))?;

        if !value.is_array() {
            return Err(FlickError::corrupt(name, "content is not an array"));
        }

        let records: Vec<Record> = serde_json::from_value(value)
            .map_err(|e| FlickError::corrupt(name, format!("invalid record: {}", e)))?;

        Ok(Self {
            name: name.to_string(),
            records,
        })
    }

    /// Encode the records as a compact JSON array
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.records)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Data of the first record whose key matches exactly
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.records.iter().find(|r| r.key == key).map(|r| &r.data)
    }

    /// Data of every record whose key is in `keys`, in storage order,
    /// truncated to `limit` entries
    pub fn select(&self, keys: &[String], limit: usize) -> Vec<Value> {
        self.records
            .iter()
            .filter(|r| keys.iter().any(|k| *k == r.key))
            .take(limit)
            .map(|r| r.data.clone())
            .collect()
    }

    /// Data of every record in storage order, optionally truncated
    pub fn all(&self, limit: Option<usize>) -> Vec<Value> {
        self.records
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|r| r.data.clone())
            .collect()
    }

    /// Replace the data stored under `key`, or append a new record
    ///
    /// Returns true if an existing record was replaced.
    pub fn upsert(&mut self, key: &str, data: Value) -> bool {
        match self.records.iter_mut().find(|r| r.key == key) {
            Some(record) => {
                record.data = data;
                true
            }
            None => {
                self.records.push(Record::new(key, data));
                false
            }
        }
    }

    /// Remove the first record with `key`; returns whether one was removed
    pub fn remove(&mut self, key: &str) -> bool {
        match self.records.iter().position(|r| r.key == key) {
            Some(idx) => {
                self.records.remove(idx);
                true
            }
            None => false,
        }
    }
}

// =============================================================================
// Names and Paths
// =============================================================================

/// Check that a collection name is safe to use as a file stem
///
/// Allowed: 1..=128 characters of `[A-Za-z0-9_-.]`, not starting with `.`.
pub fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(FlickError::validation("collection name is empty"));
    }
    if name.len() > MAX_COLLECTION_NAME_LEN {
        return Err(FlickError::validation(format!(
            "collection name is longer than {} characters",
            MAX_COLLECTION_NAME_LEN
        )));
    }
    if name.starts_with('.') {
        return Err(FlickError::validation(format!(
            "collection name {} must not start with '.'",
            name
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(FlickError::validation(format!(
            "collection name {} contains invalid character {:?}",
            name, c
        )));
    }
    Ok(())
}

/// `<volume>/<name>.json`
pub fn collection_path(volume: &Path, name: &str) -> PathBuf {
    volume.join(format!("{}.{}", name, COLLECTION_EXTENSION))
}

/// Temporary file used while rewriting `path`
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Collection name for a file in the volume
/// "users.json" → Some("users"); "users.json.tmp" → None
pub fn parse_collection_name(path: &Path) -> Option<String> {
    if path.extension()? != COLLECTION_EXTENSION {
        return None;
    }
    let name = path.file_stem()?.to_str()?;
    validate_collection_name(name).ok()?;
    Some(name.to_string())
}

// =============================================================================
// File I/O
// =============================================================================

/// Whether a file exists at `path`
pub async fn exists(path: &Path) -> Result<bool> {
    match fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Read and decode the collection stored at `path`
pub async fn read_collection(path: &Path, name: &str) -> Result<Collection> {
    match fs::read(path).await {
        Ok(bytes) => Collection::decode(name, &bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(FlickError::CollectionNotFound(name.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Replace the file at `path` with the encoded collection
///
/// Writes a temporary sibling first and renames it into place. On any
/// failure the temporary file is removed and `path` is left as it was.
pub async fn write_collection(
    path: &Path,
    collection: &Collection,
    sync_strategy: SyncStrategy,
) -> Result<()> {
    let bytes = collection.encode()?;
    let tmp = temp_path(path);

    let written = async {
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        if sync_strategy == SyncStrategy::EveryWrite {
            file.sync_all().await?;
        }
        Ok::<(), std::io::Error>(())
    }
    .await;

    let replaced = match written {
        Ok(()) => fs::rename(&tmp, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = replaced {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    tracing::trace!(
        "Wrote collection {} ({} records, {} bytes)",
        collection.name(),
        collection.len(),
        bytes.len()
    );
    Ok(())
}
