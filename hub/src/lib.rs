//! Live socket hub for the relay.
//!
//! The hub is the transport half of the relay: it owns the outbound queue of
//! every socket that is currently open on this process and hands out the
//! connection ids those sockets are known by. It holds no routing state;
//! which class a connection belongs to lives in the registry, never here.
//!
//! # Architecture
//!
//! - **Id assignment**: each accepted socket is registered and receives a fresh
//!   UUID v4 connection id.
//! - **Bounded queues**: every connection gets a bounded outbound queue drained
//!   by the socket's writer task, so a slow peer cannot grow memory without bound.
//! - **Push by id**: `ConnectionHub::push` is the opaque "send bytes to
//!   connection X" primitive. Pushing to an id that is no longer registered, or
//!   whose writer has gone away, fails with a stale-connection error.
//!
//! # Modules
//!
//! - `connection`: ConnectionHub and the type-safe ConnectionId
//! - `error`: failures returned by `push`

pub mod connection;
pub mod error;

pub use connection::{ConnectionHub, ConnectionId};
pub use error::PushFailure;
