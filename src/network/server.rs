//! TCP Server
//!
//! Accepts connections and runs each one as its own task.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::{FlickError, Result};

use super::Connection;

/// Pause after a failed accept, e.g. when the process is out of descriptors
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// TCP server for FlickDB
pub struct Server {
    config: Arc<Config>,
    dispatcher: Arc<Dispatcher>,
    listener: TcpListener,

    /// One permit per open connection
    limit: Arc<Semaphore>,
}

impl Server {
    /// Bind the listen address from `config`
    pub async fn bind(config: Config, dispatcher: Arc<Dispatcher>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr).await.map_err(|e| {
            FlickError::Network(format!("failed to bind {}: {}", config.listen_addr, e))
        })?;
        let limit = Arc::new(Semaphore::new(config.max_connections.max(1)));

        Ok(Self {
            config: Arc::new(config),
            dispatcher,
            listener,
            limit,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until Ctrl+C
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        })
        .await
    }

    /// Serve until `shutdown` completes
    ///
    /// On shutdown the listener stops accepting, open connections finish
    /// their current reply and close, and this waits for all of them.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!("FlickDB listening on {}", self.local_addr()?);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        tracing::warn!("Connection task failed: {}", e);
                    }
                }
                accepted = self.accept() => {
                    let (stream, addr, permit) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                            continue;
                        }
                    };
                    tracing::info!("New connection from {}", addr);

                    let dispatcher = Arc::clone(&self.dispatcher);
                    let config = Arc::clone(&self.config);
                    let shutdown_rx = shutdown_rx.clone();
                    connections.spawn(async move {
                        let _permit = permit;
                        match Connection::new(stream, dispatcher, &config) {
                            Ok(mut connection) => {
                                if let Err(e) = connection.handle(shutdown_rx).await {
                                    tracing::warn!("Connection {} closed with error: {}", addr, e);
                                }
                            }
                            Err(e) => tracing::warn!("Failed to set up connection {}: {}", addr, e),
                        }
                        tracing::info!("Connection from {} closed", addr);
                    });
                }
            }
        }

        let _ = shutdown_tx.send(true);
        tracing::info!("Waiting for {} open connections", connections.len());
        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                tracing::warn!("Connection task failed: {}", e);
            }
        }

        tracing::info!("Server stopped");
        Ok(())
    }

    /// Wait for a free connection slot, then for a client
    async fn accept(&self) -> Result<(TcpStream, SocketAddr, OwnedSemaphorePermit)> {
        let permit = Arc::clone(&self.limit)
            .acquire_owned()
            .await
            .map_err(|e| FlickError::Network(e.to_string()))?;
        let (stream, addr) = self.listener.accept().await?;
        Ok((stream, addr, permit))
    }
}
