//! Protocol codec
//!
//! Newline-delimited framing for commands and replies.
//!
//! ## Wire Format
//! ```text
//! ┌───────────────────────────────────────┬──────┐
//! │        JSON envelope / reply           │ '\n' │
//! └───────────────────────────────────────┴──────┘
//! ```
//!
//! Compact JSON never contains a raw newline, so the delimiter is
//! unambiguous. A trailing `\r` is tolerated and blank lines are skipped.
//! Bytes are accumulated in a persistent buffer, so a message may arrive
//! over several reads and one read may carry several messages.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{FlickError, Result};

use super::{Command, Response};

/// Message delimiter
pub const MESSAGE_DELIMITER: u8 = b'\n';

/// Default maximum message size (16 MB)
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Splits a byte stream into messages
#[derive(Debug, Clone)]
pub struct MessageDecoder {
    /// Largest accepted message, delimiter excluded
    max_len: usize,

    /// Bytes at the front of the buffer already known to hold no delimiter
    scanned: usize,
}

impl Default for MessageDecoder {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_SIZE)
    }
}

impl MessageDecoder {
    pub fn new(max_len: usize) -> Self {
        Self { max_len, scanned: 0 }
    }

    /// Take the next complete message from the buffer
    ///
    /// Returns `Ok(None)` if more data is required, or a protocol error once
    /// the pending message grows past the size limit.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>> {
        loop {
            let start = self.scanned.min(buf.len());
            let Some(offset) = buf[start..].iter().position(|b| *b == MESSAGE_DELIMITER) else {
                self.scanned = buf.len();
                // A trailing '\r' may still be followed by the delimiter
                let pending = match buf.last() {
                    Some(b'\r') => buf.len() - 1,
                    _ => buf.len(),
                };
                if pending > self.max_len {
                    return Err(self.too_large(pending));
                }
                return Ok(None);
            };

            let end = start + offset;
            self.scanned = 0;

            let mut line = buf.split_to(end + 1);
            line.truncate(end);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }

            if line.len() > self.max_len {
                return Err(self.too_large(line.len()));
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            return Ok(Some(line.freeze()));
        }
    }

    fn too_large(&self, len: usize) -> FlickError {
        FlickError::Protocol(format!(
            "message of {} bytes exceeds limit of {} bytes",
            len, self.max_len
        ))
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Append the delimiter to a payload
pub fn encode_message(payload: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(payload.len() + 1);
    message.extend_from_slice(payload);
    message.push(MESSAGE_DELIMITER);
    message
}

/// Encode a command as a framed envelope
pub fn encode_command(command: &Command) -> Result<Vec<u8>> {
    let json = command.to_envelope().to_json()?;
    Ok(encode_message(&json))
}

/// Encode a reply as a framed line
pub fn encode_response(response: &Response) -> Vec<u8> {
    encode_message(response.to_wire().as_bytes())
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read the next complete message from a stream
///
/// Returns `Ok(None)` when the peer closes the stream; any partial message
/// left in the buffer is discarded.
pub async fn read_message<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut BytesMut,
    decoder: &mut MessageDecoder,
) -> Result<Option<Bytes>> {
    loop {
        if let Some(message) = decoder.decode(buf)? {
            return Ok(Some(message));
        }
        if reader.read_buf(buf).await? == 0 {
            return Ok(None);
        }
    }
}

/// Write a framed message to a stream and flush it
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, message: &[u8]) -> Result<()> {
    writer.write_all(message).await?;
    writer.flush().await?;
    Ok(())
}
