//! Prometheus recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus recorder as the global `metrics` recorder.
///
/// Returns the handle used to render `/metrics`. Fails if a recorder is
/// already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric names, shared with the runtime crate which records by literal.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Upgrades refused at the connection limit (counter).
pub const WS_CONNECTIONS_REJECTED_TOTAL: &str = "ws_connections_rejected_total";
/// Frames dropped because a client's queue was full (counter).
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// Connection lifetime (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Sessions created total (counter).
pub const SESSIONS_CREATED_TOTAL: &str = "sessions_created_total";
/// Sessions evicted from memory total (counter).
pub const SESSIONS_RETIRED_TOTAL: &str = "sessions_retired_total";
/// Sessions cached in memory (gauge).
pub const SESSIONS_ACTIVE: &str = "sessions_active";
/// Moves applied total (counter).
pub const MOVES_APPLIED_TOTAL: &str = "moves_applied_total";
/// Moves rejected total (counter, labels: reason).
pub const MOVES_REJECTED_TOTAL: &str = "moves_rejected_total";
/// Time spent applying a move under the session token (histogram).
pub const MOVE_APPLY_DURATION_SECONDS: &str = "move_apply_duration_seconds";
/// Failed store writes (counter).
pub const PERSISTENCE_FAILURES_TOTAL: &str = "persistence_failures_total";
