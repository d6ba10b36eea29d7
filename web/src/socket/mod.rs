//! WebSocket handler for the web layer.
//!
//! This module contains only the Axum handler for the socket endpoint.
//! The table of live sockets lives in the `hub` crate and the routing
//! decisions live in `domain`.

pub(crate) mod handler;
