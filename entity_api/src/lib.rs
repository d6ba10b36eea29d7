pub use entity::{connection_class, connections, ConnectionId};

pub mod connection;
pub mod error;
