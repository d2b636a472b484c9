//! # rook-server
//!
//! Axum HTTP + `WebSocket` transport for rook.
//!
//! - HTTP endpoints: `/health`, `/metrics`
//! - `WebSocket` gateway at `/ws`: connection tracking, ping/pong liveness, message dispatch
//! - Room fan-out via [`websocket::broadcast::BroadcastManager`], the runtime's transport
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;
