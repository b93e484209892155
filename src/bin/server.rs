//! FlickDB Server Binary
//!
//! Starts the TCP server for FlickDB.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use flickdb::network::Server;
use flickdb::{Config, Dispatcher, SyncStrategy};
use tracing_subscriber::{fmt, EnvFilter};

/// FlickDB Server
#[derive(Parser, Debug)]
#[command(name = "flickdb-server")]
#[command(about = "Networked JSON document store with file-backed collections")]
#[command(version)]
struct Args {
    /// Volume directory holding the collection files (must exist)
    #[arg(short, long, env = "VOLUME", default_value = "./data")]
    volume: PathBuf,

    /// Listen host
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Largest accepted message in MB
    #[arg(long, default_value = "16")]
    max_message_mb: usize,

    /// Close connections idle for this many milliseconds (0 = never)
    #[arg(long, default_value = "0")]
    read_timeout_ms: u64,

    /// Skip fsync when rewriting collection files
    #[arg(long)]
    no_fsync: bool,

    /// Username (accepted, not enforced)
    #[arg(long, env = "USERNAME")]
    username: Option<String>,

    /// Password (accepted, not enforced)
    #[arg(long, env = "PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,flickdb=debug"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();
    let listen_addr = format!("{}:{}", args.host, args.port);

    tracing::info!("FlickDB Server v{}", flickdb::VERSION);
    tracing::info!("Volume path: {}", args.volume.display());
    tracing::info!("Listen address: {}", listen_addr);

    let sync_strategy = if args.no_fsync {
        SyncStrategy::OsBuffered
    } else {
        SyncStrategy::EveryWrite
    };

    // Build config from args
    let config = Config::builder()
        .volume(&args.volume)
        .listen_addr(listen_addr)
        .max_connections(args.max_connections)
        .max_message_bytes(args.max_message_mb * 1024 * 1024)
        .read_timeout_ms(args.read_timeout_ms)
        .sync_strategy(sync_strategy)
        .credentials(args.username, args.password)
        .build();

    if config.has_credentials() {
        tracing::warn!("Credentials are configured but not enforced");
    }

    // Refuse to start without a volume
    let dispatcher = match Dispatcher::open(&config) {
        Ok(d) => Arc::new(d),
        Err(e) => {
            tracing::error!("Failed to open volume: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::bind(config, dispatcher).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Ready to accept connections");

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
