//! Relay server listener
//!
//! Handles the TCP accept loop and spawns session handlers.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::auth::IdentityVerifier;
use crate::error::Result;
use crate::registry::ConnectionRegistry;
use crate::router::MessageRouter;
use crate::server::config::ServerConfig;
use crate::session::Session;
use crate::stats::RelayStats;

/// WebSocket relay server
///
/// Generic over the identity verifier so the hub can sit behind whatever
/// credential scheme the platform runs.
pub struct RelayServer<V: IdentityVerifier> {
    config: ServerConfig,
    verifier: Arc<V>,
    registry: Arc<ConnectionRegistry>,
    router: Arc<MessageRouter>,
    stats: Arc<RelayStats>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl<V: IdentityVerifier> RelayServer<V> {
    /// Create a new server with the given configuration and verifier.
    pub fn new(config: ServerConfig, verifier: V) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let registry = Arc::new(ConnectionRegistry::new());
        let stats = Arc::new(RelayStats::new());
        let router = Arc::new(MessageRouter::new(Arc::clone(&registry), Arc::clone(&stats)));

        Self {
            config,
            verifier: Arc::new(verifier),
            registry,
            router,
            stats,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// The connection registry
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// The message router — the hub's outward API for event sources
    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    /// Server-wide counters
    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            environment = %self.config.environment,
            "Relay server listening"
        );

        self.accept_loop(&listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            environment = %self.config.environment,
            "Relay server listening"
        );

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        }
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
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
        // Check connection limit; the permit rides along for the session's
        // whole lifetime.
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match Arc::clone(sem).try_acquire_owned() {
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

        tracing::debug!(session_id, peer = %peer_addr, "New connection");

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(session_id, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let session = Session::new(
            session_id,
            peer_addr,
            self.config.clone(),
            Arc::clone(&self.verifier),
            Arc::clone(&self.registry),
            Arc::clone(&self.router),
            Arc::clone(&self.stats),
        );

        tokio::spawn(async move {
            let _permit = permit;

            if let Err(e) = session.run(socket).await {
                tracing::debug!(session_id, error = %e, "Connection error");
            }

            tracing::debug!(session_id, "Connection closed");
        });
    }
}
