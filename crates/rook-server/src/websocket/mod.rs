//! WebSocket connection state, fan-out, message dispatch, and per-connection loop.

pub mod broadcast;
pub mod connection;
pub mod handler;
pub mod session;
