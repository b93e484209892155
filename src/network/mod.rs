//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - One accept loop on the tokio runtime
//! - One task per connection, bounded by `max_connections`
//! - Commands routed through the Dispatcher

mod connection;
mod server;

pub use connection::Connection;
pub use server::Server;
