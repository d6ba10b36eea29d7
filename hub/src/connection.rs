use crate::error::PushFailure;
use dashmap::DashMap;
use log::*;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Table of open sockets keyed by connection id - O(1) register, unregister and push
pub struct ConnectionHub {
    connections: DashMap<String, Sender<String>>,
    queue_size: usize,
}

impl ConnectionHub {
    pub fn new(queue_size: usize) -> Self {
        Self {
            connections: DashMap::new(),
            queue_size: queue_size.max(1),
        }
    }

    /// Register a new socket. The returned receiver yields every payload pushed
    /// to the connection and is expected to be drained by the socket's writer.
    pub fn register(&self) -> (ConnectionId, Receiver<String>) {
        let connection_id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(self.queue_size);

        self.connections.insert(connection_id.as_str().to_string(), tx);
        debug!("Registered socket {connection_id}");

        (connection_id, rx)
    }

    /// Unregister a socket. Dropping its sender ends the writer's receive loop.
    pub fn unregister(&self, connection_id: &ConnectionId) {
        if self.connections.remove(connection_id.as_str()).is_some() {
            debug!("Unregistered socket {connection_id}");
        }
    }

    /// Enqueue a payload for one connection without waiting for queue space.
    pub fn push(&self, connection_id: &str, payload: String) -> Result<(), PushFailure> {
        let Some(sender) = self.connections.get(connection_id) else {
            return Err(PushFailure::UnknownConnection);
        };

        match sender.try_send(payload) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(payload)) => {
                warn!(
                    "Outbound queue full for connection {}, dropping {} byte payload",
                    connection_id,
                    payload.len()
                );
                Err(PushFailure::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(PushFailure::Closed),
        }
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[tokio::test]
    async fn push_delivers_to_the_registered_receiver() {
        let hub = ConnectionHub::new(8);
        let (id, mut rx) = hub.register();

        hub.push(id.as_str(), "hello".to_string()).unwrap();

        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[test]
    fn push_to_unknown_connection_is_not_stale() {
        let hub = ConnectionHub::new(8);

        let err = hub.push("missing", "hello".to_string()).unwrap_err();

        assert_eq!(err, PushFailure::UnknownConnection);
        assert!(!err.is_stale());
    }

    #[test]
    fn push_after_receiver_dropped_is_stale() {
        let hub = ConnectionHub::new(8);
        let (id, rx) = hub.register();
        drop(rx);

        let err = hub.push(id.as_str(), "hello".to_string()).unwrap_err();

        assert_eq!(err, PushFailure::Closed);
        assert!(err.is_stale());
    }

    #[test]
    fn push_into_full_queue_is_not_stale() {
        let hub = ConnectionHub::new(1);
        let (id, _rx) = hub.register();

        hub.push(id.as_str(), "first".to_string()).unwrap();
        let err = hub.push(id.as_str(), "second".to_string()).unwrap_err();

        assert_eq!(err, PushFailure::QueueFull);
        assert!(!err.is_stale());
    }

    #[test]
    fn unregister_removes_the_connection() {
        let hub = ConnectionHub::new(8);
        let (id, _rx) = hub.register();

        hub.unregister(&id);

        assert_eq!(
            hub.push(id.as_str(), "hello".to_string()),
            Err(PushFailure::UnknownConnection)
        );
    }
}
