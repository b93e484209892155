//! Error types for FlickDB
//!
//! Provides a unified error type for all operations. Every variant renders
//! to the single-line text that follows the `[ERROR]` marker on the wire.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using FlickError
pub type Result<T> = std::result::Result<T, FlickError>;

/// Unified error type for FlickDB operations
#[derive(Debug, Error)]
pub enum FlickError {
    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("malformed message: {0}")]
    Protocol(String),

    #[error("{0}")]
    Validation(String),

    #[error("command does not exist: {0}")]
    UnknownCommand(String),

    // -------------------------------------------------------------------------
    // Collection Errors
    // -------------------------------------------------------------------------
    #[error("collection {0} does not exist")]
    CollectionNotFound(String),

    #[error("collection {0} already exists")]
    CollectionExists(String),

    #[error("key {key} does not exist in collection {collection}")]
    KeyNotFound { collection: String, key: String },

    #[error("collection {name} is corrupt: {reason}")]
    CorruptCollection { name: String, reason: String },

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("volume does not exist at {}", .0.display())]
    StorageUnavailable(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Network / Client Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with an `[ERROR]` reply
    #[error("{0}")]
    Remote(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Stable classification of a [`FlickError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Protocol,
    Validation,
    UnknownCommand,
    CollectionNotFound,
    CollectionExists,
    KeyNotFound,
    CorruptCollection,
    StorageUnavailable,
    Io,
    Serialization,
    Network,
    Remote,
    Config,
}

impl FlickError {
    /// Shorthand for a validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        FlickError::Validation(message.into())
    }

    /// Shorthand for a corrupt collection file
    pub fn corrupt(name: impl Into<String>, reason: impl ToString) -> Self {
        FlickError::CorruptCollection {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlickError::Protocol(_) => ErrorKind::Protocol,
            FlickError::Validation(_) => ErrorKind::Validation,
            FlickError::UnknownCommand(_) => ErrorKind::UnknownCommand,
            FlickError::CollectionNotFound(_) => ErrorKind::CollectionNotFound,
            FlickError::CollectionExists(_) => ErrorKind::CollectionExists,
            FlickError::KeyNotFound { .. } => ErrorKind::KeyNotFound,
            FlickError::CorruptCollection { .. } => ErrorKind::CorruptCollection,
            FlickError::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            FlickError::Io(_) => ErrorKind::Io,
            FlickError::Serialization(_) => ErrorKind::Serialization,
            FlickError::Network(_) => ErrorKind::Network,
            FlickError::Remote(_) => ErrorKind::Remote,
            FlickError::Config(_) => ErrorKind::Config,
        }
    }
}
