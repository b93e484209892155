//! FlickDB CLI Client
//!
//! Command-line interface for interacting with FlickDB.

use clap::{Parser, Subcommand};
use flickdb::{Client, Result};
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

/// FlickDB CLI
#[derive(Parser, Debug)]
#[command(name = "flickdb-cli")]
#[command(about = "CLI for the FlickDB document store")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, env = "FLICKDB_SERVER", default_value = "127.0.0.1:8000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get the data stored under a key
    Get {
        collection: String,
        key: String,
    },

    /// Get the data of several keys (storage order)
    GetMany {
        collection: String,

        /// Keys to fetch
        #[arg(required = true)]
        keys: Vec<String>,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Get the data of every record
    GetAll {
        collection: String,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Store JSON data under a key
    Set {
        collection: String,
        key: String,

        /// JSON text, e.g. '{"age": 30}'
        data: String,
    },

    /// Delete a key
    Del {
        collection: String,
        key: String,
    },

    /// Ping the server
    Ping,

    /// Create a collection
    Create { name: String },

    /// Delete a collection
    Drop { name: String },

    /// List collections
    List,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args = Args::parse();

    match run(args).await {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(text) => println!("{}", text),
            Err(_) => println!("{}", value),
        },
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            std::process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<Value> {
    let mut client = Client::connect(&args.server).await?;
    tracing::debug!("Connected to {}", args.server);

    match args.command {
        Commands::Get { collection, key } => client.get(&collection, &key).await,
        Commands::GetMany {
            collection,
            keys,
            limit,
        } => {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            client.get_many(&collection, &keys, limit).await
        }
        Commands::GetAll { collection, limit } => client.get_all(&collection, limit).await,
        Commands::Set {
            collection,
            key,
            data,
        } => {
            let data: Value = serde_json::from_str(&data)?;
            client.set(&collection, &key, data).await
        }
        Commands::Del { collection, key } => client.delete(&collection, &key).await,
        Commands::Ping => client.ping().await,
        Commands::Create { name } => client.create_collection(&name).await,
        Commands::Drop { name } => client.delete_collection(&name).await,
        Commands::List => client.list_collections().await,
    }
}
