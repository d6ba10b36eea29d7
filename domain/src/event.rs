//! Inbound events and their decoding.
//!
//! The hosting transport hands the relay a loosely structured envelope: a route
//! key, the id of the connection it concerns and an optional text body. The
//! envelope is decoded here, before any routing logic runs, into the closed set
//! of events the relay understands. Anything else is rejected.
use crate::error::{Error, EventErrorKind};
use entity_api::{connection_class::ConnectionClass, ConnectionId};
use serde::{Deserialize, Serialize};
use service::config::{Config, DEFAULT_AGENT_IDENTIFY_TOKEN, DEFAULT_COUNTERPART_IDENTIFY_TOKEN};
use utoipa::ToSchema;

pub const CONNECT_ROUTE: &str = "$connect";
pub const DISCONNECT_ROUTE: &str = "$disconnect";
pub const DEFAULT_ROUTE: &str = "$default";

/// Raw event as delivered by the socket gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Envelope {
    /// One of `$connect`, `$disconnect` or `$default`.
    #[schema(example = "$default")]
    pub route_key: String,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub connection_id: Option<ConnectionId>,
    /// Text payload of a `$default` event.
    #[serde(default)]
    pub body: Option<String>,
}

impl Envelope {
    pub fn connect(connection_id: &str) -> Self {
        Self {
            route_key: CONNECT_ROUTE.to_string(),
            connection_id: Some(connection_id.to_string()),
            body: None,
        }
    }

    pub fn disconnect(connection_id: &str) -> Self {
        Self {
            route_key: DISCONNECT_ROUTE.to_string(),
            connection_id: Some(connection_id.to_string()),
            body: None,
        }
    }

    pub fn message(connection_id: &str, body: impl Into<String>) -> Self {
        Self {
            route_key: DEFAULT_ROUTE.to_string(),
            connection_id: Some(connection_id.to_string()),
            body: Some(body.into()),
        }
    }

    /// Decodes the envelope into an [`InboundEvent`].
    ///
    /// A `$default` body equal to one of the identify tokens becomes an
    /// `Identify`; every other `$default` body is relayed as-is.
    pub fn decode(self, tokens: &IdentifyTokens) -> Result<InboundEvent, Error> {
        let Envelope {
            route_key,
            connection_id,
            body,
        } = self;

        if ![CONNECT_ROUTE, DISCONNECT_ROUTE, DEFAULT_ROUTE].contains(&route_key.as_str()) {
            return Err(Error::event(EventErrorKind::UnrecognizedRoute(route_key)));
        }

        let connection_id = connection_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::event(EventErrorKind::MissingConnectionId))?;

        let event = match route_key.as_str() {
            CONNECT_ROUTE => Event::Connect,
            DISCONNECT_ROUTE => Event::Disconnect,
            _ => {
                let body = body.unwrap_or_default();
                match tokens.classify(&body) {
                    Some(class) => Event::Identify(class),
                    None => Event::Relay(body),
                }
            }
        };

        Ok(InboundEvent {
            connection_id,
            event,
        })
    }
}

/// Every kind of event the relay acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect,
    Disconnect,
    Identify(ConnectionClass),
    Relay(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub connection_id: ConnectionId,
    pub event: Event,
}

/// The control payloads that distinguish agents from counterparts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifyTokens {
    pub agent: String,
    pub counterpart: String,
}

impl IdentifyTokens {
    /// Matches exactly; surrounding whitespace makes a payload an ordinary message.
    pub fn classify(&self, body: &str) -> Option<ConnectionClass> {
        if body == self.agent {
            Some(ConnectionClass::Agent)
        } else if body == self.counterpart {
            Some(ConnectionClass::Counterpart)
        } else {
            None
        }
    }
}

impl Default for IdentifyTokens {
    fn default() -> Self {
        Self {
            agent: DEFAULT_AGENT_IDENTIFY_TOKEN.to_string(),
            counterpart: DEFAULT_COUNTERPART_IDENTIFY_TOKEN.to_string(),
        }
    }
}

impl From<&Config> for IdentifyTokens {
    fn from(config: &Config) -> Self {
        Self {
            agent: config.agent_identify_token().to_string(),
            counterpart: config.counterpart_identify_token().to_string(),
        }
    }
}
