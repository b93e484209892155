//! Response definitions
//!
//! A reply is either a JSON value or a single line starting with the
//! `[ERROR]` marker. Clients must check for the marker before parsing.

use serde_json::Value;

use crate::error::{FlickError, Result};

/// Prefix of every error reply
pub const ERROR_MARKER: &str = "[ERROR]";

/// A reply to one message
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Success payload
    Value(Value),

    /// Error message (without the marker)
    Error(String),
}

impl Response {
    /// Create an ERROR response from an error
    pub fn error(error: &FlickError) -> Self {
        Response::Error(error.to_string())
    }

    /// Build from a dispatch result
    pub fn from_result(result: Result<Value>) -> Self {
        match result {
            Ok(value) => Response::Value(value),
            Err(e) => Response::error(&e),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }

    /// Render the reply as it is written to the socket (without delimiter)
    ///
    /// Error text is folded onto one line so it cannot split the frame.
    pub fn to_wire(&self) -> String {
        match self {
            Response::Value(value) => value.to_string(),
            Response::Error(message) => {
                let message: String = message
                    .chars()
                    .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
                    .collect();
                format!("{} {}", ERROR_MARKER, message)
            }
        }
    }

    /// Parse a reply line received from the server
    pub fn parse(line: &str) -> Result<Self> {
        if let Some(message) = line.strip_prefix(ERROR_MARKER) {
            return Ok(Response::Error(message.trim_start().to_string()));
        }

        serde_json::from_str(line)
            .map(Response::Value)
            .map_err(|e| FlickError::Protocol(format!("invalid reply: {}", e)))
    }

    /// Convert into a result, mapping error replies to `FlickError::Remote`
    pub fn into_result(self) -> Result<Value> {
        match self {
            Response::Value(value) => Ok(value),
            Response::Error(message) => Err(FlickError::Remote(message)),
        }
    }
}
