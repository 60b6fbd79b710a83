//! Hub server listener
//!
//! Handles the TCP accept loop and spawns a WebSocket session per connection.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};

use crate::error::Result;
use crate::hub::ChannelHub;
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;

/// WebSocket front end for a [`ChannelHub`]
pub struct HubServer {
    config: ServerConfig,
    hub: Arc<ChannelHub>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
    shutdown_tx: watch::Sender<bool>,
}

impl HubServer {
    /// Create a new server that owns a fresh hub
    pub fn new(config: ServerConfig) -> Self {
        let hub = Arc::new(ChannelHub::with_config(config.hub.clone()));
        Self::with_hub(config, hub)
    }

    /// Create a new server around an existing hub
    ///
    /// Lets in-process publishers (the REST layer) share the hub with the
    /// WebSocket clients.
    pub fn with_hub(config: ServerConfig, hub: Arc<ChannelHub>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            hub,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
            shutdown_tx,
        }
    }

    /// Get a reference to the channel hub
    pub fn hub(&self) -> &Arc<ChannelHub> {
        &self.hub
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "Hub server listening");
        Ok(listener)
    }

    /// Run the server
    ///
    /// This method blocks until the accept loop fails to bind.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = self.bind().await?;
        self.serve_until(listener, shutdown).await
    }

    /// Serve an already-bound listener until `shutdown` resolves
    ///
    /// Open sessions are sent a going-away close frame on shutdown.
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
            }
            _ = self.accept_loop(&listener) => {}
        }

        self.shutdown_tx.send_replace(true);
        Ok(())
    }

    async fn accept_loop(&self, listener: &TcpListener) {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        let connection = Connection::new(
            session_id,
            socket,
            peer_addr,
            self.config.clone(),
            Arc::clone(&self.hub),
            self.shutdown_tx.subscribe(),
        );

        tokio::spawn(async move {
            // Held for the lifetime of the session
            let _permit = permit;

            if let Err(e) = connection.run().await {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Connection error"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Channel;

    #[tokio::test]
    async fn test_with_hub_shares_hub() {
        let hub = Arc::new(ChannelHub::new());
        let server = HubServer::with_hub(ServerConfig::default(), Arc::clone(&hub));

        let (id, _rx) = hub.connect().await;
        hub.subscribe(id, &Channel::new("lower").unwrap()).await.unwrap();

        assert_eq!(server.hub().connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_serve_until_stops() {
        let config = ServerConfig::default().bind("127.0.0.1:0".parse().unwrap());
        let server = HubServer::new(config);
        let listener = server.bind().await.unwrap();

        server
            .serve_until(listener, async {})
            .await
            .unwrap();

        assert!(*server.shutdown_tx.borrow());
    }
}
