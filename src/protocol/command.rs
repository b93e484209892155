//! Command definitions
//!
//! The raw [`Envelope`] as it arrives on the wire, and the validated
//! [`Command`] the dispatcher executes.
//!
//! ## Envelope
//! ```text
//! { "type": "COMMAND",
//!   "command": "SET",
//!   "collection": "users",
//!   "auth": { "user": "...", "password": "..." },      (ignored)
//!   "commands": { "set": { "key": "lasse", "data": { "age": 30 } } } }
//! ```

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FlickError, Result};
use crate::storage::validate_collection_name;

/// Value of the envelope `type` field for commands
pub const COMMAND_TYPE: &str = "COMMAND";

/// Default `limit` for GET_MANY
pub const DEFAULT_GET_MANY_LIMIT: usize = 10;

/// Command kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Get,
    GetMany,
    GetAll,
    Delete,
    Set,
    Ping,
    CreateCollection,
    DeleteCollection,
    ListCollections,
}

impl CommandKind {
    pub const ALL: [CommandKind; 9] = [
        CommandKind::Get,
        CommandKind::GetMany,
        CommandKind::GetAll,
        CommandKind::Delete,
        CommandKind::Set,
        CommandKind::Ping,
        CommandKind::CreateCollection,
        CommandKind::DeleteCollection,
        CommandKind::ListCollections,
    ];

    /// Wire name, e.g. `GET_MANY`
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Get => "GET",
            CommandKind::GetMany => "GET_MANY",
            CommandKind::GetAll => "GET_ALL",
            CommandKind::Delete => "DELETE",
            CommandKind::Set => "SET",
            CommandKind::Ping => "PING",
            CommandKind::CreateCollection => "CREATE_COLLECTION",
            CommandKind::DeleteCollection => "DELETE_COLLECTION",
            CommandKind::ListCollections => "LIST_COLLECTIONS",
        }
    }

    /// Look up a kind by its exact wire name
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Key of this kind's argument object under `commands`, e.g. `get_many`
    pub fn args_field(self) -> &'static str {
        match self {
            CommandKind::Get => "get",
            CommandKind::GetMany => "get_many",
            CommandKind::GetAll => "get_all",
            CommandKind::Delete => "delete",
            CommandKind::Set => "set",
            CommandKind::Ping => "ping",
            CommandKind::CreateCollection => "create_collection",
            CommandKind::DeleteCollection => "delete_collection",
            CommandKind::ListCollections => "list_collections",
        }
    }

    /// Whether the envelope must name a `collection`
    pub fn requires_collection(self) -> bool {
        !matches!(
            self,
            CommandKind::Ping
                | CommandKind::CreateCollection
                | CommandKind::DeleteCollection
                | CommandKind::ListCollections
        )
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Envelope
// =============================================================================

/// Credentials carried by an envelope. Parsed, never checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// An inbound message before validation
///
/// Fields are kept as raw JSON so that a mistyped field is reported by the
/// check that owns it, in validation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<Value>,
}

impl Envelope {
    /// Parse a message into an envelope
    ///
    /// Invalid JSON or a non-object message is a protocol error.
    pub fn parse(message: &[u8]) -> Result<Self> {
        let value: Value =
            serde_json::from_slice(message).map_err(|e| FlickError::Protocol(e.to_string()))?;

        if !value.is_object() {
            return Err(FlickError::Protocol(
                "message is not a JSON object".to_string(),
            ));
        }

        serde_json::from_value(value)
            .map_err(|e| FlickError::Protocol(format!("invalid envelope: {}", e)))
    }

    /// Envelope checks that precede command dispatch
    ///
    /// 1. `type` must be `COMMAND`
    /// 2. `collection` must be present unless the command does not need one
    pub fn check_header(&self) -> Result<()> {
        match present(&self.message_type) {
            None => return Err(FlickError::validation("missing type")),
            Some(Value::String(t)) if t == COMMAND_TYPE => {}
            Some(other) => {
                let shown = other.as_str().map_or_else(|| other.to_string(), str::to_string);
                return Err(FlickError::validation(format!(
                    "not a valid type: {}",
                    shown
                )));
            }
        }

        let needs_collection = self
            .command_name()
            .and_then(CommandKind::parse)
            .map_or(true, CommandKind::requires_collection);

        if needs_collection {
            match present(&self.collection) {
                Some(Value::String(name)) if !name.is_empty() => {}
                Some(Value::String(_)) | None => {
                    return Err(FlickError::validation("no collection provided"))
                }
                Some(_) => return Err(FlickError::validation("collection must be a string")),
            }
        }

        Ok(())
    }

    /// The `command` field, if it is a string
    pub fn command_name(&self) -> Option<&str> {
        self.command.as_ref().and_then(Value::as_str)
    }

    /// Credentials from the `auth` field, if it has the expected shape
    pub fn credentials(&self) -> Option<Credentials> {
        present(&self.auth).and_then(|auth| serde_json::from_value(auth.clone()).ok())
    }

    /// Serialize to a single-line JSON message (without delimiter)
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// A field that is present and not `null`
fn present(field: &Option<Value>) -> Option<&Value> {
    field.as_ref().filter(|value| !value.is_null())
}

// =============================================================================
// Command
// =============================================================================

/// A validated command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Data of one record
    Get { collection: String, key: String },

    /// Data of the records whose keys are listed
    GetMany {
        collection: String,
        keys: Vec<String>,
        limit: usize,
    },

    /// Data of every record
    GetAll {
        collection: String,
        limit: Option<usize>,
    },

    /// Remove a record
    Delete { collection: String, key: String },

    /// Insert or replace a record
    Set {
        collection: String,
        key: String,
        data: Value,
    },

    /// Round-trip timing
    Ping,

    /// Create an empty collection
    CreateCollection { name: String },

    /// Remove a collection and all its records
    DeleteCollection { name: String },

    /// Names of all collections
    ListCollections,
}

#[derive(Deserialize)]
struct KeyArgs {
    key: Option<String>,
}

#[derive(Deserialize)]
struct SetArgs {
    key: Option<String>,
    data: Option<Value>,
}

#[derive(Deserialize)]
struct GetManyArgs {
    keys: Option<Vec<String>>,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct GetAllArgs {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct NameArgs {
    name: Option<String>,
}

impl Command {
    /// Validate an envelope into a command
    ///
    /// Assumes [`Envelope::check_header`] has passed.
    pub fn from_envelope(envelope: Envelope) -> Result<Self> {
        let raw = match present(&envelope.command) {
            None => return Err(FlickError::validation("missing command")),
            Some(Value::String(raw)) => raw.as_str(),
            Some(_) => return Err(FlickError::validation("command must be a string")),
        };
        let kind =
            CommandKind::parse(raw).ok_or_else(|| FlickError::UnknownCommand(raw.to_string()))?;

        let args = match envelope.commands {
            None | Some(Value::Null) => None,
            Some(Value::Object(mut commands)) => commands.remove(kind.args_field()),
            Some(_) => return Err(FlickError::validation("commands must be an object")),
        };
        let collection = envelope.collection;

        let command = match kind {
            CommandKind::Get => {
                let args: KeyArgs = required_args(kind, args)?;
                Command::Get {
                    collection: collection_name(collection)?,
                    key: required_string(kind, "key", args.key)?,
                }
            }
            CommandKind::GetMany => {
                let args: GetManyArgs = required_args(kind, args)?;
                Command::GetMany {
                    collection: collection_name(collection)?,
                    keys: args.keys.unwrap_or_default(),
                    limit: args.limit.unwrap_or(DEFAULT_GET_MANY_LIMIT),
                }
            }
            CommandKind::GetAll => {
                let limit = match args {
                    Some(args) => parse_args::<GetAllArgs>(kind, args)?.limit,
                    None => None,
                };
                Command::GetAll {
                    collection: collection_name(collection)?,
                    limit,
                }
            }
            CommandKind::Delete => {
                let args: KeyArgs = required_args(kind, args)?;
                Command::Delete {
                    collection: collection_name(collection)?,
                    key: required_string(kind, "key", args.key)?,
                }
            }
            CommandKind::Set => {
                let args: SetArgs = required_args(kind, args)?;
                let key = required_string(kind, "key", args.key)?;
                let data = args.data.ok_or_else(|| {
                    FlickError::validation(format!("missing commands.{}.data", kind.args_field()))
                })?;
                Command::Set {
                    collection: collection_name(collection)?,
                    key,
                    data,
                }
            }
            CommandKind::Ping => Command::Ping,
            CommandKind::CreateCollection => {
                let args: NameArgs = required_args(kind, args)?;
                let name = required_string(kind, "name", args.name)?;
                validate_collection_name(&name)?;
                Command::CreateCollection { name }
            }
            CommandKind::DeleteCollection => {
                let args: NameArgs = required_args(kind, args)?;
                let name = required_string(kind, "name", args.name)?;
                validate_collection_name(&name)?;
                Command::DeleteCollection { name }
            }
            CommandKind::ListCollections => Command::ListCollections,
        };

        Ok(command)
    }

    /// Get the command kind
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Get { .. } => CommandKind::Get,
            Command::GetMany { .. } => CommandKind::GetMany,
            Command::GetAll { .. } => CommandKind::GetAll,
            Command::Delete { .. } => CommandKind::Delete,
            Command::Set { .. } => CommandKind::Set,
            Command::Ping => CommandKind::Ping,
            Command::CreateCollection { .. } => CommandKind::CreateCollection,
            Command::DeleteCollection { .. } => CommandKind::DeleteCollection,
            Command::ListCollections => CommandKind::ListCollections,
        }
    }

    /// Collection the command targets, if any
    pub fn collection(&self) -> Option<&str> {
        match self {
            Command::Get { collection, .. }
            | Command::GetMany { collection, .. }
            | Command::GetAll { collection, .. }
            | Command::Delete { collection, .. }
            | Command::Set { collection, .. } => Some(collection),
            Command::CreateCollection { name } | Command::DeleteCollection { name } => Some(name),
            Command::Ping | Command::ListCollections => None,
        }
    }

    /// Build the envelope a client sends for this command
    pub fn to_envelope(&self) -> Envelope {
        let kind = self.kind();
        let (collection, args) = match self {
            Command::Get { collection, key } | Command::Delete { collection, key } => {
                (Some(collection.clone()), Some(serde_json::json!({ "key": key })))
            }
            Command::GetMany {
                collection,
                keys,
                limit,
            } => (
                Some(collection.clone()),
                Some(serde_json::json!({ "keys": keys, "limit": limit })),
            ),
            Command::GetAll { collection, limit } => {
                let args = limit.map(|limit| serde_json::json!({ "limit": limit }));
                (Some(collection.clone()), args)
            }
            Command::Set {
                collection,
                key,
                data,
            } => (
                Some(collection.clone()),
                Some(serde_json::json!({ "key": key, "data": data })),
            ),
            Command::CreateCollection { name } | Command::DeleteCollection { name } => {
                (None, Some(serde_json::json!({ "name": name })))
            }
            Command::Ping | Command::ListCollections => (None, None),
        };

        let commands = args.map(|args| {
            let mut commands = Map::new();
            commands.insert(kind.args_field().to_string(), args);
            Value::Object(commands)
        });

        Envelope {
            message_type: Some(Value::from(COMMAND_TYPE)),
            command: Some(Value::from(kind.as_str())),
            collection: collection.map(Value::String),
            auth: None,
            commands,
        }
    }
}

// =============================================================================
// Argument Helpers
// =============================================================================

fn parse_args<T: DeserializeOwned>(kind: CommandKind, args: Value) -> Result<T> {
    serde_json::from_value(args).map_err(|e| {
        FlickError::validation(format!("invalid commands.{}: {}", kind.args_field(), e))
    })
}

fn required_args<T: DeserializeOwned>(kind: CommandKind, args: Option<Value>) -> Result<T> {
    match args {
        Some(args) => parse_args(kind, args),
        None => Err(FlickError::validation(format!(
            "missing commands.{}",
            kind.args_field()
        ))),
    }
}

fn required_string(kind: CommandKind, field: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        Some(_) => Err(FlickError::validation(format!(
            "commands.{}.{} is empty",
            kind.args_field(),
            field
        ))),
        None => Err(FlickError::validation(format!(
            "missing commands.{}.{}",
            kind.args_field(),
            field
        ))),
    }
}

fn collection_name(collection: Option<Value>) -> Result<String> {
    let name = match collection {
        None | Some(Value::Null) => None,
        Some(Value::String(name)) => Some(name),
        Some(_) => return Err(FlickError::validation("collection must be a string")),
    };
    let name = name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| FlickError::validation("no collection provided"))?;
    validate_collection_name(&name)?;
    Ok(name)
}
