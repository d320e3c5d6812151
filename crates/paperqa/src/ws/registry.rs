//! Registry of live WebSocket connections.

use dashmap::DashMap;
use log::{debug, warn};
use tokio::sync::mpsc;

use super::types::ServerEnvelope;

/// Outbound channel of one connection's writer task.
pub type ConnectionSender = mpsc::Sender<ServerEnvelope>;

/// Process-wide map of client id to live connection.
///
/// At most one entry per client id: a second connect with the same id
/// replaces the mapping (last writer wins). The registry does not close the
/// replaced transport, the owning task winds itself down when its socket
/// drops.
pub struct ConnectionRegistry {
    connections: DashMap<String, ConnectionSender>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a connection, replacing any prior entry for the client id.
    pub fn register(&self, client_id: &str, sender: ConnectionSender) {
        if self
            .connections
            .insert(client_id.to_string(), sender)
            .is_some()
        {
            debug!("replaced live connection for client {client_id}");
        }
    }

    /// Remove a connection's entry.
    ///
    /// Guarded by a channel identity check so that a connection replaced by
    /// a newer one cannot evict its replacement during teardown.
    pub fn unregister(&self, client_id: &str, sender: &ConnectionSender) {
        self.connections
            .remove_if(client_id, |_, current| current.same_channel(sender));
    }

    /// Sender for a live client, if any.
    pub fn get(&self, client_id: &str) -> Option<ConnectionSender> {
        self.connections
            .get(client_id)
            .map(|entry| entry.value().clone())
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Best-effort fan-out to every live connection. Individual send
    /// failures are logged and do not stop the fan-out.
    pub async fn broadcast(&self, envelope: ServerEnvelope) {
        let targets: Vec<(String, ConnectionSender)> = self
            .connections
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        for (client_id, sender) in targets {
            if sender.send(envelope.clone()).await.is_err() {
                warn!("broadcast to client {client_id} failed, connection is gone");
            }
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> (ConnectionSender, mpsc::Receiver<ServerEnvelope>) {
        mpsc::channel(4)
    }

    #[tokio::test]
    async fn register_and_get() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = sender();
        registry.register("alice", tx.clone());

        assert!(registry.get("alice").is_some());
        assert!(registry.get("bob").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn second_register_replaces_entry() {
        let registry = ConnectionRegistry::new();
        let (old_tx, _old_rx) = sender();
        let (new_tx, mut new_rx) = sender();
        registry.register("alice", old_tx);
        registry.register("alice", new_tx);

        assert_eq!(registry.len(), 1);
        let current = registry.get("alice").unwrap();
        current
            .send(ServerEnvelope::Error {
                content: "ping".to_string(),
            })
            .await
            .unwrap();
        assert!(new_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn stale_unregister_does_not_evict_replacement() {
        let registry = ConnectionRegistry::new();
        let (old_tx, _old_rx) = sender();
        let (new_tx, _new_rx) = sender();
        registry.register("alice", old_tx.clone());
        registry.register("alice", new_tx);

        registry.unregister("alice", &old_tx);
        assert!(registry.get("alice").is_some());
    }

    #[tokio::test]
    async fn unregister_removes_own_entry() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = sender();
        registry.register("alice", tx.clone());
        registry.unregister("alice", &tx);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn broadcast_survives_dead_connections() {
        let registry = ConnectionRegistry::new();
        let (dead_tx, dead_rx) = sender();
        drop(dead_rx);
        let (live_tx, mut live_rx) = sender();
        registry.register("dead", dead_tx);
        registry.register("live", live_tx);

        registry
            .broadcast(ServerEnvelope::Error {
                content: "notice".to_string(),
            })
            .await;

        assert!(live_rx.recv().await.is_some());
    }
}
