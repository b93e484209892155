//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Protocol Format (newline-delimited JSON)
//!
//! ### Request Format
//! ```text
//! {"type":"COMMAND","command":"GET","collection":"users","commands":{"get":{"key":"lasse"}}}\n
//! ```
//!
//! ### Commands
//! - GET               - commands.get: { key }
//! - GET_MANY          - commands.get_many: { keys?, limit? = 10 }
//! - GET_ALL           - commands.get_all?: { limit? }
//! - SET               - commands.set: { key, data }
//! - DELETE            - commands.delete: { key }
//! - PING              - no arguments, no collection
//! - CREATE_COLLECTION - commands.create_collection: { name }
//! - DELETE_COLLECTION - commands.delete_collection: { name }
//! - LIST_COLLECTIONS  - no arguments, no collection
//!
//! ### Response Format
//! ```text
//! {"success":true}\n                      (JSON value on success)
//! [ERROR] collection users does not exist\n
//! ```

mod codec;
mod command;
mod response;

pub use codec::{
    encode_command, encode_message, encode_response, read_message, write_message,
    MessageDecoder, MAX_MESSAGE_SIZE, MESSAGE_DELIMITER,
};
pub use command::{
    Command, CommandKind, Credentials, Envelope, COMMAND_TYPE, DEFAULT_GET_MANY_LIMIT,
};
pub use response::{Response, ERROR_MARKER};
