//! Clients for services outside the relay process.
pub mod connections_api;
