//! Client
//!
//! Async client for a FlickDB server. One request is in flight per
//! connection: every call writes a command and waits for the next reply.

use bytes::BytesMut;
use serde_json::Value;
use tokio::io::BufWriter;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::{FlickError, Result};
use crate::protocol::{
    encode_command, encode_message, read_message, write_message, Command, MessageDecoder,
    Response, DEFAULT_GET_MANY_LIMIT,
};

/// Connection to a FlickDB server
pub struct Client {
    reader: OwnedReadHalf,
    writer: BufWriter<OwnedWriteHalf>,
    buffer: BytesMut,
    decoder: MessageDecoder,
}

impl Client {
    /// Connect to a server
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| FlickError::Network(format!("failed to connect: {}", e)))?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();

        Ok(Self {
            reader,
            writer: BufWriter::new(writer),
            buffer: BytesMut::new(),
            // Replies (e.g. GET_ALL) are not size-limited
            decoder: MessageDecoder::new(usize::MAX),
        })
    }

    /// Send a raw payload (delimiter appended) and read the reply
    pub async fn send_raw(&mut self, payload: &[u8]) -> Result<Response> {
        write_message(&mut self.writer, &encode_message(payload)).await?;
        self.read_reply().await
    }

    /// Send a command and read the reply
    pub async fn execute(&mut self, command: &Command) -> Result<Response> {
        write_message(&mut self.writer, &encode_command(command)?).await?;
        self.read_reply().await
    }

    /// Send a command; error replies become `FlickError::Remote`
    pub async fn call(&mut self, command: Command) -> Result<Value> {
        self.execute(&command).await?.into_result()
    }

    async fn read_reply(&mut self) -> Result<Response> {
        let line = read_message(&mut self.reader, &mut self.buffer, &mut self.decoder)
            .await?
            .ok_or_else(|| FlickError::Network("connection closed by server".to_string()))?;
        let line = std::str::from_utf8(&line)
            .map_err(|e| FlickError::Protocol(format!("reply is not UTF-8: {}", e)))?;
        Response::parse(line)
    }

    // =========================================================================
    // Commands
    // =========================================================================

    pub async fn get(&mut self, collection: &str, key: &str) -> Result<Value> {
        self.call(Command::Get {
            collection: collection.to_string(),
            key: key.to_string(),
        })
        .await
    }

    /// GET_MANY; `limit` defaults to 10 on the server side semantics
    pub async fn get_many(
        &mut self,
        collection: &str,
        keys: &[&str],
        limit: Option<usize>,
    ) -> Result<Value> {
        self.call(Command::GetMany {
            collection: collection.to_string(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
            limit: limit.unwrap_or(DEFAULT_GET_MANY_LIMIT),
        })
        .await
    }

    pub async fn get_all(&mut self, collection: &str, limit: Option<usize>) -> Result<Value> {
        self.call(Command::GetAll {
            collection: collection.to_string(),
            limit,
        })
        .await
    }

    pub async fn set(&mut self, collection: &str, key: &str, data: Value) -> Result<Value> {
        self.call(Command::Set {
            collection: collection.to_string(),
            key: key.to_string(),
            data,
        })
        .await
    }

    pub async fn delete(&mut self, collection: &str, key: &str) -> Result<Value> {
        self.call(Command::Delete {
            collection: collection.to_string(),
            key: key.to_string(),
        })
        .await
    }

    pub async fn ping(&mut self) -> Result<Value> {
        self.call(Command::Ping).await
    }

    pub async fn create_collection(&mut self, name: &str) -> Result<Value> {
        self.call(Command::CreateCollection {
            name: name.to_string(),
        })
        .await
    }

    pub async fn delete_collection(&mut self, name: &str) -> Result<Value> {
        self.call(Command::DeleteCollection {
            name: name.to_string(),
        })
        .await
    }

    pub async fn list_collections(&mut self) -> Result<Value> {
        self.call(Command::ListCollections).await
    }
}
