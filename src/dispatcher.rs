//! Dispatcher Module
//!
//! Turns one inbound message into exactly one reply.
//!
//! ## Responsibilities
//! - Parse and validate the envelope (first failing check wins)
//! - Route validated commands to the Collection Store
//! - Shape success payloads
//! - Catch every error at the message boundary and render it as an
//!   `[ERROR]` reply

use std::time::{Duration, Instant};

use serde_json::{json, Value};

use crate::config::Config;
use crate::error::Result;
use crate::protocol::{Command, Envelope, Response};
use crate::storage::CollectionStore;

/// Validates messages and executes commands against the store
///
/// Holds no per-connection state; one instance is shared by every
/// connection behind an `Arc`.
pub struct Dispatcher {
    store: CollectionStore,
}

impl Dispatcher {
    pub fn new(store: CollectionStore) -> Self {
        Self { store }
    }

    /// Open the store described by `config` and wrap it
    pub fn open(config: &Config) -> Result<Self> {
        Ok(Self::new(CollectionStore::open(config)?))
    }

    /// Handle one raw message
    ///
    /// `received_at` is when the message's bytes were read off the socket;
    /// PING reports the time elapsed since then. Never fails: errors become
    /// `Response::Error`.
    pub async fn handle_message(&self, message: &[u8], received_at: Instant) -> Response {
        let result = self.dispatch(message, received_at).await;
        if let Err(ref e) = result {
            tracing::debug!("Command failed: {}", e);
        }
        Response::from_result(result)
    }

    /// Validation order:
    /// 1. envelope type
    /// 2. collection presence
    /// 3. volume exists
    /// 4. command kind and its arguments
    async fn dispatch(&self, message: &[u8], received_at: Instant) -> Result<Value> {
        let envelope = Envelope::parse(message)?;
        envelope.check_header()?;
        if let Some(credentials) = envelope.credentials() {
            tracing::trace!(
                user = credentials.user.as_deref().unwrap_or("-"),
                "Ignoring envelope credentials"
            );
        }
        self.store.ensure_available().await?;
        let command = Command::from_envelope(envelope)?;

        tracing::debug!(
            command = %command.kind(),
            collection = command.collection().unwrap_or("-"),
            "Executing command"
        );

        self.execute(command, received_at).await
    }

    /// Execute a validated command
    pub async fn execute(&self, command: Command, received_at: Instant) -> Result<Value> {
        match command {
            Command::Get { collection, key } => self.store.get(&collection, &key).await,
            Command::GetMany {
                collection,
                keys,
                limit,
            } => {
                let values = self.store.get_many(&collection, &keys, limit).await?;
                Ok(Value::Array(values))
            }
            Command::GetAll { collection, limit } => {
                let values = self.store.get_all(&collection, limit).await?;
                Ok(Value::Array(values))
            }
            Command::Set {
                collection,
                key,
                data,
            } => {
                self.store.set(&collection, &key, data).await?;
                Ok(success())
            }
            Command::Delete { collection, key } => {
                self.store.delete(&collection, &key).await?;
                Ok(success())
            }
            Command::CreateCollection { name } => {
                self.store.create_collection(&name).await?;
                Ok(success())
            }
            Command::DeleteCollection { name } => {
                self.store.drop_collection(&name).await?;
                Ok(success())
            }
            Command::ListCollections => {
                let names = self.store.list_collections().await?;
                Ok(json!(names))
            }
            Command::Ping => Ok(ping_payload(received_at.elapsed())),
        }
    }
}

/// `{"success": true}`
fn success() -> Value {
    json!({ "success": true })
}

/// `{"type": "ms", "time": <elapsed milliseconds>}`
pub fn ping_payload(elapsed: Duration) -> Value {
    json!({ "type": "ms", "time": elapsed.as_secs_f64() * 1000.0 })
}
