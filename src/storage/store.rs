//! Collection Store
//!
//! Owns the volume and every collection file in it.
//!
//! ## Responsibilities
//! - Load a collection for each read (whole file, linear scan)
//! - Read-modify-write a collection for each mutation
//! - Create, drop and list collections
//! - Serialize mutations per collection name

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::fs;

use crate::config::{Config, SyncStrategy};
use crate::error::{FlickError, Result};

use super::collection::{
    self, collection_path, parse_collection_name, read_collection, validate_collection_name,
    write_collection, Collection,
};
use super::locks::CollectionLocks;

/// File-backed store of named collections
///
/// ## Concurrency:
/// - Mutations (set/delete/create/drop) hold the collection's lock from
///   the first read to the final rename.
/// - Reads take no lock. Files are only ever replaced by atomic rename, so
///   a read sees either the old or the new array, never a mix.
pub struct CollectionStore {
    /// Directory holding the collection files
    volume: PathBuf,

    /// fsync behaviour for rewrites
    sync_strategy: SyncStrategy,

    /// One async mutex per collection name
    locks: CollectionLocks,
}

impl CollectionStore {
    /// Open the store rooted at `config.volume`
    ///
    /// Fails with `StorageUnavailable` if the volume is missing or is not a
    /// directory. The volume is never created implicitly.
    pub fn open(config: &Config) -> Result<Self> {
        if !config.volume.is_dir() {
            return Err(FlickError::StorageUnavailable(config.volume.clone()));
        }

        Ok(Self {
            volume: config.volume.clone(),
            sync_strategy: config.sync_strategy,
            locks: CollectionLocks::new(),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified volume
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().volume(path).build();
        Self::open(&config)
    }

    /// Check that the volume still exists
    pub async fn ensure_available(&self) -> Result<()> {
        match fs::metadata(&self.volume).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            _ => Err(FlickError::StorageUnavailable(self.volume.clone())),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Load a whole collection
    pub async fn load(&self, name: &str) -> Result<Collection> {
        validate_collection_name(name)?;
        read_collection(&self.collection_path(name), name).await
    }

    /// Data of the first record with `key`
    ///
    /// Returns `KeyNotFound` when no record matches.
    pub async fn get(&self, name: &str, key: &str) -> Result<Value> {
        let collection = self.load(name).await?;
        collection
            .get(key)
            .cloned()
            .ok_or_else(|| FlickError::KeyNotFound {
                collection: name.to_string(),
                key: key.to_string(),
            })
    }

    /// Data of every record whose key is in `keys`, storage order, at most `limit`
    pub async fn get_many(&self, name: &str, keys: &[String], limit: usize) -> Result<Vec<Value>> {
        let collection = self.load(name).await?;
        Ok(collection.select(keys, limit))
    }

    /// Data of every record, storage order, at most `limit` if given
    pub async fn get_all(&self, name: &str, limit: Option<usize>) -> Result<Vec<Value>> {
        let collection = self.load(name).await?;
        Ok(collection.all(limit))
    }

    /// Names of all collections in the volume, sorted
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.volume).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FlickError::StorageUnavailable(self.volume.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = parse_collection_name(&entry.path()) {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Store `data` under `key`, replacing any existing record
    pub async fn set(&self, name: &str, key: &str, data: Value) -> Result<()> {
        validate_collection_name(name)?;
        if key.is_empty() {
            return Err(FlickError::validation("key is empty"));
        }
        if data.is_null() {
            return Err(FlickError::validation("data is null"));
        }

        let _guard = self.locks.acquire(name).await;
        let path = self.collection_path(name);

        let mut collection = read_collection(&path, name).await?;
        let replaced = collection.upsert(key, data);
        write_collection(&path, &collection, self.sync_strategy).await?;

        tracing::trace!(
            "SET {}/{} ({})",
            name,
            key,
            if replaced { "replaced" } else { "appended" }
        );
        Ok(())
    }

    /// Remove the first record with `key`
    ///
    /// Returns whether a record was removed. A miss is not an error and
    /// leaves the file untouched.
    pub async fn delete(&self, name: &str, key: &str) -> Result<bool> {
        validate_collection_name(name)?;

        let _guard = self.locks.acquire(name).await;
        let path = self.collection_path(name);

        let mut collection = read_collection(&path, name).await?;
        if !collection.remove(key) {
            return Ok(false);
        }
        write_collection(&path, &collection, self.sync_strategy).await?;

        tracing::trace!("DELETE {}/{}", name, key);
        Ok(true)
    }

    /// Create an empty collection
    pub async fn create_collection(&self, name: &str) -> Result<()> {
        validate_collection_name(name)?;

        let _guard = self.locks.acquire(name).await;
        let path = self.collection_path(name);

        if collection::exists(&path).await? {
            return Err(FlickError::CollectionExists(name.to_string()));
        }
        write_collection(&path, &Collection::new(name), self.sync_strategy).await?;

        tracing::debug!("Created collection {}", name);
        Ok(())
    }

    /// Delete a collection and its file
    pub async fn drop_collection(&self, name: &str) -> Result<()> {
        validate_collection_name(name)?;

        let _guard = self.locks.acquire(name).await;
        match fs::remove_file(self.collection_path(name)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FlickError::CollectionNotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!("Dropped collection {}", name);
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Path of the file backing `name`
    pub fn collection_path(&self, name: &str) -> PathBuf {
        collection_path(&self.volume, name)
    }

    /// Write locks of collections currently being mutated
    pub fn locks(&self) -> &CollectionLocks {
        &self.locks
    }
}
