//! # FlickDB
//!
//! A small networked document store:
//! - Named collections, one JSON file each
//! - Records addressed by exact key, data is any JSON value
//! - Newline-delimited JSON commands over TCP
//! - Per-collection write serialization with atomic file replacement
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │               (one task per connection)                      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  newline-delimited messages
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     Dispatcher                               │
//! │        (validate envelope → command → reply/[ERROR])         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Collection Store                            │
//! │     (per-collection lock, temp file + atomic rename)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!                       ▼
//!               {volume}/<name>.json
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod client;
pub mod dispatcher;
pub mod network;
pub mod protocol;
pub mod storage;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use client::Client;
pub use config::{Config, SyncStrategy};
pub use dispatcher::Dispatcher;
pub use error::{ErrorKind, FlickError, Result};
pub use storage::CollectionStore;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of FlickDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
