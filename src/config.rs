//! Configuration for FlickDB
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Main configuration for a FlickDB instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Volume holding one file per collection:
    ///   {volume}/
    ///     ├── users.json
    ///     └── orders.json
    pub volume: PathBuf,

    /// Whether collection rewrites are fsynced before they replace the old file
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Largest accepted message (bytes, excluding the newline)
    pub max_message_bytes: usize,

    /// Idle read timeout (milliseconds, 0 = wait forever)
    pub read_timeout_ms: u64,

    /// Reply write timeout (milliseconds, 0 = wait forever)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Credentials
    // -------------------------------------------------------------------------
    /// Accepted for compatibility with existing deployments; never checked
    pub username: Option<String>,

    /// Accepted for compatibility with existing deployments; never checked
    pub password: Option<String>,
}

/// Collection write durability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync the temporary file before renaming it into place
    EveryWrite,

    /// Rename without fsync; the OS decides when data reaches disk
    OsBuffered,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            volume: PathBuf::from("./data"),
            sync_strategy: SyncStrategy::EveryWrite,
            listen_addr: "127.0.0.1:8000".to_string(),
            max_connections: 1024,
            max_message_bytes: 16 * 1024 * 1024, // 16 MB
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
            username: None,
            password: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// True when a username or password was supplied
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() || self.password.is_some()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the volume (root for all collection files)
    pub fn volume(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.volume = path.into();
        self
    }

    /// Set the write sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the maximum message size (in bytes)
    pub fn max_message_bytes(mut self, size: usize) -> Self {
        self.config.max_message_bytes = size;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the (unenforced) credentials
    pub fn credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.config.username = username;
        self.config.password = password;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
