//! WebSocket endpoint and wire protocol.

pub mod connection;
pub mod protocol;
