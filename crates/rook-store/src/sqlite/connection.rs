//! `r2d2` pool over `SQLite`.
//!
//! File databases run in WAL mode with `synchronous = NORMAL`; every pooled
//! connection gets the configured busy timeout when it is opened.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::errors::Result;

/// Alias for the connection pool type.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Alias for a pooled connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Pool settings.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Maximum pool size for file databases.
    pub pool_size: u32,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

fn build_pool(manager: SqliteConnectionManager, size: u32, config: &ConnectionConfig) -> Result<ConnectionPool> {
    let busy_timeout = Duration::from_millis(u64::from(config.busy_timeout_ms));
    let manager = manager.with_init(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
    });
    Ok(Pool::builder()
        .max_size(size)
        .connection_timeout(Duration::from_secs(5))
        .build(manager)?)
}

/// In-memory pool for tests and ephemeral runs.
///
/// Each `SQLite` memory connection is its own database, so the pool holds a
/// single connection regardless of `pool_size`.
pub fn new_in_memory(config: &ConnectionConfig) -> Result<ConnectionPool> {
    build_pool(SqliteConnectionManager::memory(), 1, config)
}

/// File-backed pool.
pub fn new_file(path: &str, config: &ConnectionConfig) -> Result<ConnectionPool> {
    build_pool(SqliteConnectionManager::file(path), config.pool_size, config)
}
