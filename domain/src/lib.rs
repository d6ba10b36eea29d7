//! The relay core: event decoding, the connection lifecycle, the registry
//! contract and group broadcast of messages between agents and counterparts.

// Re-exports from `entity` crate via `entity_api`, so that consumers of `domain`
// never depend on `entity_api` directly.
pub use entity_api::{connection_class::ConnectionClass, connections, ConnectionId};

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod gateway;
pub mod lifecycle;
pub mod registry;
pub mod relay;
pub mod transport;
