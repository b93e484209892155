//! Tests for the TCP server and client
//!
//! These tests verify:
//! - Request/reply over a real socket, one reply per message in order
//! - Framing across split writes and several messages per write
//! - Error replies keep the connection open
//! - Oversized messages close the connection
//! - Graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use flickdb::protocol::Response;
use flickdb::{Client, Config, Dispatcher, ErrorKind};
use serde_json::json;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use flickdb::network::Server;

// =============================================================================
// Helper Functions
// =============================================================================

struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<flickdb::Result<()>>,
    _temp: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(|builder| builder).await
    }

    async fn start_with(
        configure: impl FnOnce(flickdb::config::ConfigBuilder) -> flickdb::config::ConfigBuilder,
    ) -> Self {
        let temp = TempDir::new().unwrap();
        let config = configure(
            Config::builder()
                .volume(temp.path())
                .listen_addr("127.0.0.1:0"),
        )
        .build();

        let dispatcher = Arc::new(Dispatcher::open(&config).unwrap());
        let server = Server::bind(config, dispatcher).await.unwrap();
        let addr = server.local_addr().unwrap();

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));

        Self {
            addr,
            shutdown: Some(tx),
            handle,
            _temp: temp,
        }
    }

    async fn client(&self) -> Client {
        Client::connect(self.addr).await.unwrap()
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), &mut self.handle)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}

/// Raw line-oriented connection for framing tests
async fn raw_connect(addr: SocketAddr) -> (BufReader<OwnedReadHalf>, OwnedWriteHalf) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (reader, writer) = stream.into_split();
    (BufReader::new(reader), writer)
}

async fn read_line(reader: &mut BufReader<OwnedReadHalf>) -> String {
    let mut line = String::new();
    tokio::time::timeout(Duration::from_secs(5), reader.read_line(&mut line))
        .await
        .expect("timed out waiting for reply")
        .unwrap();
    line
}

/// EOF or reset, without any further reply
async fn is_closed(reader: &mut BufReader<OwnedReadHalf>) -> bool {
    let mut line = String::new();
    let read = tokio::time::timeout(Duration::from_secs(5), reader.read_line(&mut line))
        .await
        .expect("timed out waiting for close");
    matches!(read, Ok(0) | Err(_))
}

// =============================================================================
// Client Round Trip Tests
// =============================================================================

#[tokio::test]
async fn test_client_round_trip() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    assert_eq!(client.create_collection("users").await.unwrap(), json!({"success": true}));
    client.set("users", "lasse", json!({"age": 30})).await.unwrap();
    client.set("users", "maja", json!({"age": 25})).await.unwrap();

    assert_eq!(client.get("users", "lasse").await.unwrap(), json!({"age": 30}));
    assert_eq!(
        client.get_many("users", &["maja", "lasse"], None).await.unwrap(),
        json!([{"age": 30}, {"age": 25}])
    );
    assert_eq!(
        client.get_all("users", Some(1)).await.unwrap(),
        json!([{"age": 30}])
    );
    assert_eq!(client.list_collections().await.unwrap(), json!(["users"]));

    client.delete("users", "lasse").await.unwrap();
    let err = client.get("users", "lasse").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Remote);
    assert_eq!(err.to_string(), "key lasse does not exist in collection users");

    client.delete_collection("users").await.unwrap();
    assert_eq!(client.list_collections().await.unwrap(), json!([]));

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn test_ping() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    let reply = client.ping().await.unwrap();
    assert_eq!(reply["type"], "ms");
    assert!(reply["time"].as_f64().unwrap() >= 0.0);

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn test_error_reply_keeps_connection_open() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    let response = client.send_raw(b"this is not json").await.unwrap();
    assert!(response.is_error());

    let response = client
        .send_raw(br#"{"type":"COMMAND","command":"NOPE","collection":"c"}"#)
        .await
        .unwrap();
    assert_eq!(response, Response::Error("command does not exist: NOPE".into()));

    // Same connection still serves commands
    assert_eq!(client.list_collections().await.unwrap(), json!([]));

    drop(client);
    server.stop().await;
}

// =============================================================================
// Framing Tests
// =============================================================================

#[tokio::test]
async fn test_message_split_across_writes() {
    let server = TestServer::start().await;
    let (mut reader, mut writer) = raw_connect(server.addr).await;

    writer.write_all(br#"{"type":"COMM"#).await.unwrap();
    writer.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    writer.write_all(b"AND\",\"command\":\"LIST_COLLECTIONS\"}\n").await.unwrap();

    assert_eq!(read_line(&mut reader).await, "[]\n");

    drop(writer);
    server.stop().await;
}

#[tokio::test]
async fn test_several_messages_in_one_write() {
    let server = TestServer::start().await;
    let (mut reader, mut writer) = raw_connect(server.addr).await;

    let batch = concat!(
        r#"{"type":"COMMAND","command":"CREATE_COLLECTION","commands":{"create_collection":{"name":"c"}}}"#,
        "\n",
        r#"{"type":"COMMAND","command":"SET","collection":"c","commands":{"set":{"key":"k","data":7}}}"#,
        "\r\n",
        r#"{"type":"COMMAND","command":"GET","collection":"c","commands":{"get":{"key":"k"}}}"#,
        "\n",
    );
    writer.write_all(batch.as_bytes()).await.unwrap();

    // Replies arrive in request order
    assert_eq!(read_line(&mut reader).await, "{\"success\":true}\n");
    assert_eq!(read_line(&mut reader).await, "{\"success\":true}\n");
    assert_eq!(read_line(&mut reader).await, "7\n");

    drop(writer);
    server.stop().await;
}

#[tokio::test]
async fn test_oversized_message_closes_connection() {
    let server = TestServer::start_with(|builder| builder.max_message_bytes(64)).await;
    let (mut reader, mut writer) = raw_connect(server.addr).await;

    writer.write_all(&[b'x'; 256]).await.unwrap();

    let reply = read_line(&mut reader).await;
    assert!(reply.starts_with("[ERROR] malformed message"), "{}", reply);

    // Server hangs up afterwards
    assert!(is_closed(&mut reader).await);

    drop(writer);
    server.stop().await;
}

// =============================================================================
// Concurrency / Lifecycle Tests
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clients() {
    let server = TestServer::start().await;
    server
        .client()
        .await
        .create_collection("shared")
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let addr = server.addr;
        handles.push(tokio::spawn(async move {
            let mut client = Client::connect(addr).await.unwrap();
            for j in 0..10 {
                client
                    .set("shared", &format!("c{}-{}", i, j), json!(j))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut client = server.client().await;
    let all = client.get_all("shared", None).await.unwrap();
    assert_eq!(all.as_array().unwrap().len(), 80);

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_idle_connections() {
    let server = TestServer::start().await;
    let (mut reader, _writer) = raw_connect(server.addr).await;

    // Make sure the connection has been accepted
    let mut client = server.client().await;
    client.ping().await.unwrap();

    server.stop().await;

    // Idle connection was closed by the server
    assert!(is_closed(&mut reader).await);
    drop(client);
}
