//! Storage Module
//!
//! Persistent storage layer: one JSON file per collection.
//!
//! ## Responsibilities
//! - Persist each collection as a JSON array of `{key, data}` records
//! - Exact-key lookups by linear scan
//! - Whole-file rewrite on every mutation (temp file + atomic rename)
//! - Per-collection write serialization
//!
//! ## Volume Layout
//! ```text
//! {volume}/
//!   ├── users.json         [{"key":"lasse","data":{"age":30}}]
//!   ├── orders.json        []
//!   └── users.json.tmp     (only while a rewrite is in flight)
//! ```

mod collection;
mod locks;
mod store;

pub use collection::{
    collection_path, parse_collection_name, read_collection, validate_collection_name,
    write_collection, Collection, Record, COLLECTION_EXTENSION, MAX_COLLECTION_NAME_LEN,
};
pub use locks::{CollectionGuard, CollectionLocks};
pub use store::CollectionStore;
