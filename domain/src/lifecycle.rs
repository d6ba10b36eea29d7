//! Connection lifecycle: connect, identify and disconnect.
//!
//! ```text
//!            identify(class)
//! PENDING ───────────────────▶ AGENT | COUNTERPART ◀─┐
//!    │                              │      └─────────┘ identify(class)
//!    │ disconnect                   │ disconnect
//!    ▼                              ▼
//! CLOSED ◀──────────────────────────┘
//! ```
//!
//! Registry writes made here are retried with exponential backoff. When every
//! attempt fails the failure is logged and swallowed: the event itself still
//! counts as handled.
use crate::error::Error;
use crate::registry::Registry;
use crate::relay::Settings;
use crate::transport::Transport;
use entity_api::connection_class::ConnectionClass;
use log::*;
use std::future::Future;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Connected but not yet identified.
    Pending,
    Agent,
    Counterpart,
    /// Disconnected; the registry no longer holds the entry.
    Closed,
}

impl From<ConnectionClass> for State {
    fn from(class: ConnectionClass) -> Self {
        match class {
            ConnectionClass::Unassigned => State::Pending,
            ConnectionClass::Agent => State::Agent,
            ConnectionClass::Counterpart => State::Counterpart,
        }
    }
}

pub async fn connect(registry: &dyn Registry, settings: &Settings, connection_id: &str) -> State {
    info!("Got connection {connection_id}");

    if settings.eager_registration {
        let result = write_with_retry(settings, || {
            registry.upsert(connection_id, ConnectionClass::Unassigned)
        })
        .await;

        if let Err(err) = result {
            error!("Swallowed registry write: could not register connection {connection_id}: {err}");
        }
    }

    State::Pending
}

/// Records the connection's class and acknowledges the identify to the
/// connection itself. Identifying again overwrites the class.
pub async fn identify(
    registry: &dyn Registry,
    transport: &dyn Transport,
    settings: &Settings,
    connection_id: &str,
    class: ConnectionClass,
) -> State {
    let (state, ack) =
        match write_with_retry(settings, || registry.upsert(connection_id, class)).await {
            Ok(_) => {
                info!("Connection {connection_id} identified as {class}");
                (State::from(class), acknowledgment(class, "connected!"))
            }
            Err(err) => {
                error!(
                    "Swallowed registry write: could not identify connection {connection_id} as {class}: {err}"
                );
                (State::Pending, acknowledgment(class, "registration failed"))
            }
        };

    if let Err(err) = transport.push(connection_id, &ack).await {
        warn!("Could not acknowledge identify to {connection_id}: {err}");
    }

    state
}

pub async fn disconnect(registry: &dyn Registry, settings: &Settings, connection_id: &str) -> State {
    match write_with_retry(settings, || registry.delete(connection_id)).await {
        Ok(()) => info!("Connection {connection_id} disconnected"),
        Err(err) => error!(
            "Swallowed registry write: could not remove connection {connection_id}: {err}"
        ),
    }

    State::Closed
}

/// Acknowledgments go out as JSON string literals, e.g. `"Agent connected!"`.
fn acknowledgment(class: ConnectionClass, status: &str) -> String {
    let subject = match class {
        ConnectionClass::Agent => "Agent",
        ConnectionClass::Counterpart => "Counterpart",
        ConnectionClass::Unassigned => "Connection",
    };
    serde_json::Value::from(format!("{subject} {status}")).to_string()
}

async fn write_with_retry<T, F, Fut>(settings: &Settings, mut write: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut attempt: u32 = 0;
    loop {
        match write().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < settings.write_retries => {
                let backoff = settings
                    .retry_backoff
                    .saturating_mul(2u32.saturating_pow(attempt));
                warn!(
                    "Registry write failed (attempt {}), retrying in {:?}: {err}",
                    attempt + 1,
                    backoff
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryErrorKind;
    use crate::registry::{Entry, MemoryRegistry, MockRegistry};
    use crate::transport::MockTransport;
    use chrono::Utc;
    use entity_api::error::{EntityApiErrorKind, Error as EntityApiError};
    use std::time::Duration;

    fn settings() -> Settings {
        Settings {
            retry_backoff: Duration::ZERO,
            ..Settings::default()
        }
    }

    fn write_error() -> Error {
        Error::registry(
            RegistryErrorKind::Write,
            EntityApiError {
                source: None,
                error_kind: EntityApiErrorKind::SystemError,
            },
        )
    }

    fn entry(id: &str, class: ConnectionClass) -> Entry {
        Entry {
            id: id.to_string(),
            class,
            registered_at: Utc::now().into(),
            expires_at: None,
        }
    }

    fn expect_ack(transport: &mut MockTransport, expected: &'static str) {
        transport
            .expect_push()
            .withf(move |id, payload| id == "a" && payload == expected)
            .times(1)
            .returning(|_, _| Ok(()));
    }

    #[tokio::test]
    async fn connect_writes_nothing_by_default() {
        let registry = MemoryRegistry::default();

        let state = connect(&registry, &settings(), "a").await;

        assert_eq!(state, State::Pending);
        assert!(registry.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn eager_connect_registers_an_unassigned_entry() {
        let registry = MemoryRegistry::default();
        let settings = Settings {
            eager_registration: true,
            ..settings()
        };

        connect(&registry, &settings, "a").await;

        assert_eq!(
            registry.get("a").await.unwrap().map(|entry| entry.class),
            Some(ConnectionClass::Unassigned)
        );
    }

    #[tokio::test]
    async fn identify_records_the_class_and_acknowledges() {
        let registry = MemoryRegistry::default();
        let mut transport = MockTransport::new();
        expect_ack(&mut transport, "\"Agent connected!\"");

        let state = identify(
            &registry,
            &transport,
            &settings(),
            "a",
            ConnectionClass::Agent,
        )
        .await;

        assert_eq!(state, State::Agent);
        assert_eq!(
            registry.get("a").await.unwrap().map(|entry| entry.class),
            Some(ConnectionClass::Agent)
        );
    }

    #[tokio::test]
    async fn identify_retries_transient_write_failures() {
        let mut registry = MockRegistry::new();
        let mut calls = 0;
        registry
            .expect_upsert()
            .times(3)
            .returning(move |id, class| {
                calls += 1;
                if calls < 3 {
                    Err(write_error())
                } else {
                    Ok(entry(id, class))
                }
            });
        let mut transport = MockTransport::new();
        expect_ack(&mut transport, "\"Counterpart connected!\"");

        let state = identify(
            &registry,
            &transport,
            &settings(),
            "a",
            ConnectionClass::Counterpart,
        )
        .await;

        assert_eq!(state, State::Counterpart);
    }

    #[tokio::test]
    async fn identify_reports_failure_to_the_connection_after_exhausting_retries() {
        let mut registry = MockRegistry::new();
        registry
            .expect_upsert()
            .times(4)
            .returning(|_, _| Err(write_error()));
        let mut transport = MockTransport::new();
        expect_ack(&mut transport, "\"Agent registration failed\"");

        let state = identify(
            &registry,
            &transport,
            &settings(),
            "a",
            ConnectionClass::Agent,
        )
        .await;

        assert_eq!(state, State::Pending);
    }

    #[tokio::test]
    async fn disconnect_removes_the_entry() {
        let registry = MemoryRegistry::default();
        registry
            .upsert("a", ConnectionClass::Counterpart)
            .await
            .unwrap();

        let state = disconnect(&registry, &settings(), "a").await;

        assert_eq!(state, State::Closed);
        assert!(registry.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn disconnect_swallows_persistent_write_failures() {
        let mut registry = MockRegistry::new();
        registry
            .expect_delete()
            .times(2)
            .returning(|_| Err(write_error()));
        let settings = Settings {
            write_retries: 1,
            ..settings()
        };

        let state = disconnect(&registry, &settings, "a").await;

        assert_eq!(state, State::Closed);
    }

    #[test]
    fn acknowledgments_are_json_string_literals() {
        assert_eq!(
            acknowledgment(ConnectionClass::Counterpart, "connected!"),
            "\"Counterpart connected!\""
        );
    }
}
