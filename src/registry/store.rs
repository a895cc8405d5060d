//! Connection registry implementation
//!
//! The central table mapping authenticated identities to their live
//! connections. At most one connection per identity is ever reachable for
//! sends; a newer connection for the same identity displaces and closes the
//! prior one.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::entry::ConnectionEntry;
use super::frame::UserId;
use crate::protocol::CloseReason;

/// Registry of all active connections, keyed by identity
///
/// Thread-safe via `RwLock`. Broadcast paths take read locks; connect and
/// disconnect take short write locks.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Map of identity to live connection
    connections: RwLock<HashMap<UserId, Arc<ConnectionEntry>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Install a connection for its identity.
    ///
    /// If a prior connection exists for the same identity it is closed with
    /// a replacement reason before this call returns, so it can never be
    /// handed out for sends again. Returns the displaced connection, if any.
    pub async fn register(&self, entry: Arc<ConnectionEntry>) -> Option<Arc<ConnectionEntry>> {
        let prior = {
            let mut connections = self.connections.write().await;
            connections.insert(entry.identity().clone(), Arc::clone(&entry))
        };

        match prior {
            Some(ref displaced) => {
                displaced.close(CloseReason::Replaced);
                tracing::info!(
                    identity = %entry.identity(),
                    old_session = displaced.session_id(),
                    new_session = entry.session_id(),
                    "Client reconnected, prior connection replaced"
                );
            }
            None => {
                tracing::info!(
                    identity = %entry.identity(),
                    session_id = entry.session_id(),
                    "Client connected"
                );
            }
        }

        prior
    }

    /// Remove the mapping for `identity` if it still points at `session_id`.
    ///
    /// Idempotent: removing an absent identity is a no-op, and a stale
    /// disconnect (the identity was already re-registered by a newer
    /// session) leaves the newer mapping in place.
    pub async fn deregister(&self, identity: &UserId, session_id: u64) {
        let mut connections = self.connections.write().await;

        match connections.get(identity) {
            Some(entry) if entry.session_id() == session_id => {
                connections.remove(identity);
                tracing::info!(identity = %identity, session_id, "Client disconnected");
            }
            Some(entry) => {
                tracing::debug!(
                    identity = %identity,
                    current_session = entry.session_id(),
                    stale_session = session_id,
                    "Deregister skipped, identity already re-registered"
                );
            }
            None => {}
        }
    }

    /// Look up the live connection for an identity
    pub async fn lookup(&self, identity: &UserId) -> Option<Arc<ConnectionEntry>> {
        self.connections.read().await.get(identity).cloned()
    }

    /// Point-in-time snapshot of all live connections for broadcast
    /// iteration.
    ///
    /// Connections registering after the snapshot is taken are not included;
    /// connections closing afterwards discard sends themselves.
    pub async fn snapshot(&self) -> Vec<Arc<ConnectionEntry>> {
        self.connections.read().await.values().cloned().collect()
    }

    /// Number of live connections
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Administratively close the connection for an identity.
    ///
    /// Returns false if the identity has no live connection. The entry is
    /// removed from the table by its session's teardown.
    pub async fn disconnect(&self, identity: &UserId, reason: CloseReason) -> bool {
        match self.lookup(identity).await {
            Some(entry) => {
                entry.close(reason);
                tracing::info!(
                    identity = %identity,
                    session_id = entry.session_id(),
                    ?reason,
                    "Administrative disconnect"
                );
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::frame::OutboundFrame;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use tokio::sync::mpsc;

    fn test_entry(
        session_id: u64,
        identity: &str,
    ) -> (Arc<ConnectionEntry>, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(8);
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3001);
        let entry = Arc::new(ConnectionEntry::new(session_id, UserId::new(identity), addr, tx));
        (entry, rx)
    }

    #[tokio::test]
    async fn test_register_then_lookup() {
        let registry = ConnectionRegistry::new();
        let (entry, _rx) = test_entry(1, "u1");

        let prior = registry.register(Arc::clone(&entry)).await;
        assert!(prior.is_none());

        let found = registry.lookup(&UserId::new("u1")).await.unwrap();
        assert!(Arc::ptr_eq(&found, &entry));
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_register_replaces_and_closes_prior() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = test_entry(1, "u1");
        let (second, _rx2) = test_entry(2, "u1");

        registry.register(Arc::clone(&first)).await;
        let displaced = registry.register(Arc::clone(&second)).await.unwrap();

        assert!(Arc::ptr_eq(&displaced, &first));
        assert!(first.is_closed());
        assert!(!second.is_closed());

        // Only the replacement is reachable
        let found = registry.lookup(&UserId::new("u1")).await.unwrap();
        assert!(Arc::ptr_eq(&found, &second));
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_deregister_idempotent() {
        let registry = ConnectionRegistry::new();
        let identity = UserId::new("u1");

        // Deregistering an absent identity is a no-op
        registry.deregister(&identity, 1).await;

        let (entry, _rx) = test_entry(1, "u1");
        registry.register(entry).await;
        registry.deregister(&identity, 1).await;
        assert!(registry.lookup(&identity).await.is_none());

        // Twice is equivalent to once
        registry.deregister(&identity, 1).await;
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_stale_deregister_keeps_replacement() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = test_entry(1, "u1");
        let (second, _rx2) = test_entry(2, "u1");

        registry.register(first).await;
        registry.register(Arc::clone(&second)).await;

        // The first session's teardown must not remove the replacement
        registry.deregister(&UserId::new("u1"), 1).await;

        let found = registry.lookup(&UserId::new("u1")).await.unwrap();
        assert!(Arc::ptr_eq(&found, &second));
    }

    #[tokio::test]
    async fn test_snapshot_reflects_registrations() {
        let registry = ConnectionRegistry::new();
        let (one, _rx1) = test_entry(1, "u1");
        let (two, _rx2) = test_entry(2, "u2");
        registry.register(one).await;
        registry.register(two).await;

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 2);

        registry.deregister(&UserId::new("u1"), 1).await;
        assert_eq!(registry.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect() {
        let registry = ConnectionRegistry::new();
        let (entry, _rx) = test_entry(1, "u1");
        registry.register(Arc::clone(&entry)).await;

        assert!(registry.disconnect(&UserId::new("u1"), CloseReason::Terminated).await);
        assert!(entry.is_closed());

        assert!(!registry.disconnect(&UserId::new("nobody"), CloseReason::Terminated).await);
    }
}
