//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use rook_settings::ServerSettings;

/// Configuration for the game server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections. Upgrades beyond this are refused.
    pub max_connections: usize,
    /// Seconds between server pings.
    pub ping_interval_secs: u64,
    /// Seconds without a pong before the client is dropped.
    pub pong_timeout_secs: u64,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Outbound queue depth per connection.
    pub send_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 256,
            ping_interval_secs: 30,
            pong_timeout_secs: 60,
            max_message_size: 64 * 1024,
            send_buffer: 256,
        }
    }
}

impl ServerConfig {
    /// Take listener and connection settings from loaded settings.
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            max_connections: settings.max_connections,
            ping_interval_secs: settings.ping_interval_secs,
            pong_timeout_secs: settings.pong_timeout_secs,
            max_message_size: settings.max_message_size,
            send_buffer: settings.send_buffer,
        }
    }

    /// Ping cadence.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    /// Pong deadline.
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs.max(1))
    }

    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
