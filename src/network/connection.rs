//! Connection Handler
//!
//! Handles individual client connections.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::watch;

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::{FlickError, Result};
use crate::protocol::{encode_response, write_message, MessageDecoder, Response};

/// Initial capacity of the per-connection read buffer
const READ_BUFFER_CAPACITY: usize = 8 * 1024;

/// Handles a single client connection
pub struct Connection {
    /// TCP read half
    reader: OwnedReadHalf,

    /// TCP write half (buffered, flushed after every reply)
    writer: BufWriter<OwnedWriteHalf>,

    /// Bytes read but not yet consumed as messages
    buffer: BytesMut,

    /// Splits `buffer` into messages
    decoder: MessageDecoder,

    /// When the most recent read completed
    last_read_at: Instant,

    /// Reference to the command dispatcher
    dispatcher: Arc<Dispatcher>,

    /// Peer address for logging
    peer_addr: String,

    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl Connection {
    /// Create a new connection handler
    pub fn new(stream: TcpStream, dispatcher: Arc<Dispatcher>, config: &Config) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let (reader, writer) = stream.into_split();

        Ok(Self {
            reader,
            writer: BufWriter::new(writer),
            buffer: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            decoder: MessageDecoder::new(config.max_message_bytes),
            last_read_at: Instant::now(),
            dispatcher,
            peer_addr,
            read_timeout: millis(config.read_timeout_ms),
            write_timeout: millis(config.write_timeout_ms),
        })
    }

    /// Handle the connection until the client disconnects or shutdown is
    /// signalled
    ///
    /// Messages are answered strictly in order; a reply is flushed before
    /// the next message is looked at.
    pub async fn handle(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            // Answer everything already buffered before reading again
            match self.decoder.decode(&mut self.buffer) {
                Ok(Some(message)) => {
                    let response = self
                        .dispatcher
                        .handle_message(&message, self.last_read_at)
                        .await;
                    if !self.send_response(&response).await? {
                        return Ok(());
                    }
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    // The stream position is lost; report and hang up
                    tracing::warn!("Closing {}: {}", self.peer_addr, e);
                    let _ = self.send_response(&Response::error(&e)).await;
                    return Err(e);
                }
            }

            if *shutdown.borrow() {
                tracing::debug!("Closing {} for shutdown", self.peer_addr);
                return Ok(());
            }

            let read = tokio::select! {
                read = self.read_more() => Some(read),
                _ = shutdown.changed() => None,
            };
            let Some(read) = read else {
                tracing::debug!("Closing {} for shutdown", self.peer_addr);
                return Ok(());
            };

            match read {
                Ok(0) => {
                    if !self.buffer.is_empty() {
                        tracing::trace!(
                            "Dropping {} bytes of partial message from {}",
                            self.buffer.len(),
                            self.peer_addr
                        );
                    }
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Ok(_) => self.last_read_at = Instant::now(),
                Err(ref e) if is_disconnect(e) => {
                    tracing::debug!("Connection reset by client {}", self.peer_addr);
                    return Ok(());
                }
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => {
                    tracing::debug!("Read timeout for client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    return Err(e.into());
                }
            }
        }
    }

    /// Read more bytes into the buffer, honouring the read timeout
    async fn read_more(&mut self) -> io::Result<usize> {
        let read = self.reader.read_buf(&mut self.buffer);
        match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"))),
            None => read.await,
        }
    }

    /// Send a response to the client
    ///
    /// Returns `Ok(false)` if the client went away before the reply could be
    /// written.
    async fn send_response(&mut self, response: &Response) -> Result<bool> {
        let bytes = encode_response(response);
        let write = write_message(&mut self.writer, &bytes);

        let result = match self.write_timeout {
            Some(limit) => match tokio::time::timeout(limit, write).await {
                Ok(result) => result,
                Err(_) => Err(FlickError::Network(format!(
                    "write to {} timed out",
                    self.peer_addr
                ))),
            },
            None => write.await,
        };

        match result {
            Ok(()) => Ok(true),
            Err(FlickError::Io(ref e)) if is_disconnect(e) => {
                tracing::debug!(
                    "Client {} disconnected before response could be sent: {}",
                    self.peer_addr,
                    e
                );
                Ok(false)
            }
            Err(e) => {
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                Err(e)
            }
        }
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}
