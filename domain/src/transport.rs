//! The "send bytes to connection X" primitive, with uniform error reporting.
use crate::error::Error;
use crate::gateway::connections_api::ConnectionsApi;
use async_trait::async_trait;
use hub::{ConnectionHub, PushFailure};
use log::*;
use service::AppState;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

/// Why a single push did not reach its recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushError {
    /// The transport will never deliver to this id again.
    StaleConnection(String),
    /// The push failed but the connection may still be alive.
    Transport(String),
}

impl PushError {
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleConnection(_))
    }
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleConnection(reason) => write!(f, "stale connection: {reason}"),
            Self::Transport(reason) => write!(f, "transport error: {reason}"),
        }
    }
}

impl std::error::Error for PushError {}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Delivers `payload` to one connection. One attempt, no retries.
    async fn push(&self, connection_id: &str, payload: &str) -> Result<(), PushError>;
}

/// Pushes into the sockets held open by this process.
pub struct HubTransport {
    hub: Arc<ConnectionHub>,
}

impl HubTransport {
    pub fn new(hub: Arc<ConnectionHub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl Transport for HubTransport {
    async fn push(&self, connection_id: &str, payload: &str) -> Result<(), PushError> {
        self.hub
            .push(connection_id, payload.to_string())
            .map_err(|failure: PushFailure| {
                if failure.is_stale() {
                    PushError::StaleConnection(failure.to_string())
                } else {
                    PushError::Transport(failure.to_string())
                }
            })
    }
}

/// Picks the push transport for this deployment: the external gateway's
/// connection management API when a callback URL is configured, otherwise the
/// local socket hub.
pub fn from_app_state(app_state: &AppState) -> Result<Arc<dyn Transport>, Error> {
    match app_state.config.transport_callback_url() {
        Some(base_url) => {
            info!("Pushing outbound messages through {base_url}");
            let timeout = Duration::from_secs(app_state.config.transport_timeout_secs);
            Ok(Arc::new(ConnectionsApi::new(&base_url, timeout)?))
        }
        None => {
            info!("Pushing outbound messages through the local socket hub");
            Ok(Arc::new(HubTransport::new(Arc::clone(&app_state.hub))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hub_transport_delivers_to_open_sockets() {
        let hub = Arc::new(ConnectionHub::new(4));
        let (id, mut rx) = hub.register();
        let transport = HubTransport::new(Arc::clone(&hub));

        transport.push(id.as_str(), "\"hi\"").await.unwrap();

        assert_eq!(rx.recv().await.as_deref(), Some("\"hi\""));
    }

    #[tokio::test]
    async fn hub_transport_reports_unknown_ids_as_transient() {
        let transport = HubTransport::new(Arc::new(ConnectionHub::new(4)));

        let err = transport.push("elsewhere", "hi").await.unwrap_err();

        assert!(matches!(err, PushError::Transport(_)));
    }

    #[tokio::test]
    async fn hub_transport_reports_closed_sockets_as_stale() {
        let hub = Arc::new(ConnectionHub::new(4));
        let (id, rx) = hub.register();
        drop(rx);
        let transport = HubTransport::new(Arc::clone(&hub));

        let err = transport.push(id.as_str(), "hi").await.unwrap_err();

        assert!(err.is_stale());
    }

    #[tokio::test]
    async fn hub_transport_reports_full_queues_as_transient() {
        let hub = Arc::new(ConnectionHub::new(1));
        let (id, _rx) = hub.register();
        let transport = HubTransport::new(Arc::clone(&hub));

        transport.push(id.as_str(), "one").await.unwrap();
        let err = transport.push(id.as_str(), "two").await.unwrap_err();

        assert!(matches!(err, PushError::Transport(_)));
    }
}
