//! Worker entry point: runs one inbound event through the relay.
//!
//! Each call is independent. Nothing about earlier events is remembered here;
//! the registry handle is acquired for the event and dropped when it is done.
use crate::dispatcher::{self, DispatchReport};
use crate::error::Error;
use crate::event::{Envelope, Event, IdentifyTokens, InboundEvent};
use crate::lifecycle::{self, State};
use crate::registry::{Registry, RegistryBackend};
use crate::transport::Transport;
use log::*;
use service::config::Config;
use std::time::Duration;

/// Behavior knobs for event handling, derived from [`Config`].
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub tokens: IdentifyTokens,
    /// Extra attempts after a failed registry write.
    pub write_retries: u32,
    /// Delay before the first retry; doubles on each further attempt.
    pub retry_backoff: Duration,
    pub eager_registration: bool,
    /// Upper bound on concurrent pushes within one dispatch.
    pub max_fanout: usize,
    pub prune_stale: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tokens: IdentifyTokens::default(),
            write_retries: 3,
            retry_backoff: Duration::from_millis(50),
            eager_registration: false,
            max_fanout: 16,
            prune_stale: true,
        }
    }
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            tokens: IdentifyTokens::from(config),
            write_retries: config.registry_write_retries,
            retry_backoff: Duration::from_millis(config.registry_retry_backoff_ms),
            eager_registration: config.eager_registration,
            max_fanout: config.max_fanout,
            prune_stale: config.prune_stale_connections,
        }
    }
}

/// Result of handling one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A connect, identify or disconnect moved the connection to this state.
    Transitioned(State),
    /// A relay message was broadcast.
    Dispatched(DispatchReport),
}

pub async fn handle(
    registry: &dyn Registry,
    transport: &dyn Transport,
    settings: &Settings,
    inbound: InboundEvent,
) -> Outcome {
    let InboundEvent {
        connection_id,
        event,
    } = inbound;

    match event {
        Event::Connect => {
            Outcome::Transitioned(lifecycle::connect(registry, settings, &connection_id).await)
        }
        Event::Disconnect => {
            Outcome::Transitioned(lifecycle::disconnect(registry, settings, &connection_id).await)
        }
        Event::Identify(class) => Outcome::Transitioned(
            lifecycle::identify(registry, transport, settings, &connection_id, class).await,
        ),
        Event::Relay(payload) => Outcome::Dispatched(
            dispatcher::dispatch(registry, transport, settings, &connection_id, &payload).await,
        ),
    }
}

/// Decodes a raw envelope and handles it with a registry handle scoped to
/// this event. Only decoding can fail; registry and transport failures are
/// absorbed by the lifecycle and dispatcher.
pub async fn handle_envelope(
    backend: &RegistryBackend,
    transport: &dyn Transport,
    settings: &Settings,
    envelope: Envelope,
) -> Result<Outcome, Error> {
    debug!(
        "Received {} event for connection {:?}",
        envelope.route_key, envelope.connection_id
    );

    let inbound = envelope.decode(&settings.tokens)?;
    let registry = backend.acquire();

    Ok(handle(registry.as_ref(), transport, settings, inbound).await)
}
