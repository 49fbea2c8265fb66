//! WebSocket transport for the signaling relay.
//!
//! Each socket gets a unique [`relay::models::ConnectionId`] from the
//! [`server::RelayServer`] task, which owns every piece of shared state and
//! processes connection events one at a time.

pub mod api;
pub mod handler;
pub mod server;

/// Message sent to a connection. Always a JSON-encoded frame.
pub type Msg = String;
