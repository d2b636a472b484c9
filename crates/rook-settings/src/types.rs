//! Settings structs. Every section deserializes with defaults for missing keys.

use serde::{Deserialize, Serialize};

use rook_core::logging::LogFormat;

use crate::errors::{Result, SettingsError};
use crate::loader::rook_home;

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RookSettings {
    /// Network listener and connection limits.
    pub server: ServerSettings,
    /// Durable store.
    pub store: StoreSettings,
    /// Session lifecycle.
    pub sessions: SessionSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl RookSettings {
    /// Reject combinations that cannot work at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_connections == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxConnections must be at least 1".into(),
            ));
        }
        if self.server.pong_timeout_secs < self.server.ping_interval_secs {
            return Err(SettingsError::InvalidValue(
                "server.pongTimeoutSecs must not be shorter than server.pingIntervalSecs".into(),
            ));
        }
        if self.store.pool_size == 0 {
            return Err(SettingsError::InvalidValue("store.poolSize must be at least 1".into()));
        }
        if self.sessions.reap_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "sessions.reapIntervalSecs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Server network and connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Seconds between server pings.
    pub ping_interval_secs: u64,
    /// Seconds without a pong before a client is dropped.
    pub pong_timeout_secs: u64,
    /// Largest inbound frame in bytes.
    pub max_message_size: usize,
    /// Outbound queue depth per connection.
    pub send_buffer: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            max_connections: 256,
            ping_interval_secs: 30,
            pong_timeout_secs: 60,
            max_message_size: 64 * 1024,
            send_buffer: 256,
        }
    }
}

/// Durable store settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// Path to the `SQLite` database file.
    pub db_path: String,
    /// Connection pool size.
    pub pool_size: u32,
    /// `SQLite` busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            db_path: rook_home().join("rook.db").to_string_lossy().into_owned(),
            pool_size: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

/// Session lifecycle settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Idle seconds after which an unattended session is retired from memory.
    pub idle_timeout_secs: u64,
    /// Seconds between idle sweeps.
    pub reap_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 1_800,
            reap_interval_secs: 60,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
