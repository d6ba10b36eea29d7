pub mod prelude;

pub mod connection_class;
pub mod connections;

/// Opaque identifier the socket gateway assigns to a connection when it opens.
/// Kept as a string since ids may come from an external gateway as well.
pub type ConnectionId = String;
