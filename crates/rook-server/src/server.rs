//! `GameServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use rook_core::{ConnectionId, MoveOracle};
use rook_runtime::GameHub;
use rook_store::SessionStore;

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::BroadcastManager;
use crate::websocket::session::run_ws_session;

/// Shared state for Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session façade the connections drive.
    pub hub: Arc<GameHub>,
    /// Live connections and room fan-out.
    pub broadcast: Arc<BroadcastManager>,
    /// Server-wide shutdown signal.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server was built.
    pub start_time: Instant,
    /// Connection and framing limits.
    pub config: ServerConfig,
    /// Prometheus handle for `/metrics`, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The game server.
pub struct GameServer {
    config: ServerConfig,
    hub: Arc<GameHub>,
    broadcast: Arc<BroadcastManager>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl GameServer {
    /// Wire a hub over `store` and `oracle` with the WebSocket fan-out as its transport.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn SessionStore>,
        oracle: Arc<dyn MoveOracle>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let broadcast = Arc::new(BroadcastManager::new());
        let hub = Arc::new(GameHub::new(store, oracle, broadcast.clone()));
        Self {
            config,
            hub,
            broadcast,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics,
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            broadcast: self.broadcast.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            config: self.config.clone(),
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the listener and serve until shutdown is signalled.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();
        info!(%addr, max_connections = self.config.max_connections, "rook server listening");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server error");
            }
            info!("server stopped accepting connections");
        });
        Ok((addr, handle))
    }

    /// Start the idle reaper and track it for shutdown.
    pub fn spawn_idle_reaper(&self, idle_timeout: Duration, interval: Duration) {
        let reaper = self.hub.idle_reaper(idle_timeout, interval);
        let token = self.shutdown.token();
        self.shutdown
            .track(tokio::spawn(async move { reaper.run(token).await }));
    }

    /// Session façade.
    pub fn hub(&self) -> &Arc<GameHub> {
        &self.hub
    }

    /// Get the broadcast manager.
    pub fn broadcast(&self) -> &Arc<BroadcastManager> {
        &self.broadcast
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

fn next_connection_id() -> ConnectionId {
    ConnectionId::from_string(format!("conn_{}", ConnectionId::new().into_inner()))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.broadcast.connection_count(),
        state.hub.active_sessions(),
    ))
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn ws_handler(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if state.shutdown.is_shutting_down() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let connections = state.broadcast.connection_count();
    if connections >= state.config.max_connections {
        counter!("ws_connections_rejected_total").increment(1);
        warn!(
            connections,
            max = state.config.max_connections,
            "connection limit reached, refusing upgrade"
        );
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let connection_id = next_connection_id();
    let shutdown = state.shutdown.token();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| {
            run_ws_session(
                socket,
                connection_id,
                state.hub,
                state.broadcast,
                state.config,
                shutdown,
            )
        })
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use rook_runtime::testing::TallyOracle;
    use rook_store::MemorySessionStore;
    use tower::ServiceExt;

    fn make_server(config: ServerConfig) -> GameServer {
        GameServer::new(
            config,
            Arc::new(MemorySessionStore::new()),
            Arc::new(TallyOracle::default()),
            None,
        )
    }

    async fn fetch(server: &GameServer, uri: &str) -> Response {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        server.router().oneshot(req).await.unwrap()
    }

    #[tokio::test]
    async fn server_with_default_config() {
        let server = make_server(ServerConfig::default());
        assert_eq!(server.config().host, "127.0.0.1");
        assert_eq!(server.config().port, 0);
        assert_eq!(server.broadcast().connection_count(), 0);
        assert!(!server.shutdown().is_shutting_down());
    }

    #[tokio::test]
    async fn health_endpoint_reports_counters() {
        let server = make_server(ServerConfig::default());
        let _ = server
            .hub()
            .create_session(&ConnectionId::from("c1"))
            .await
            .unwrap();

        let resp = fetch(&server, "/health").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 0);
        assert_eq!(parsed["active_sessions"], 1);
        assert!(parsed["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let server = make_server(ServerConfig::default());
        assert_eq!(fetch(&server, "/nonexistent").await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_without_recorder_returns_404() {
        let server = make_server(ServerConfig::default());
        assert_eq!(fetch(&server, "/metrics").await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ws_without_upgrade_headers_is_client_error() {
        let server = make_server(ServerConfig::default());
        assert!(fetch(&server, "/ws").await.status().is_client_error());
    }

    #[tokio::test]
    async fn ws_at_capacity_returns_503() {
        let server = make_server(ServerConfig {
            max_connections: 0,
            ..ServerConfig::default()
        });
        assert_eq!(
            fetch(&server, "/ws").await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn ws_during_shutdown_returns_503() {
        let server = make_server(ServerConfig::default());
        server.shutdown().shutdown();
        assert_eq!(
            fetch(&server, "/ws").await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn connection_ids_are_prefixed_and_unique() {
        let a = next_connection_id();
        let b = next_connection_id();
        assert!(a.starts_with("conn_"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn listen_binds_ephemeral_port_and_stops_on_shutdown() {
        let server = make_server(ServerConfig::default());
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        server.shutdown().shutdown();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn idle_reaper_is_tracked_and_drained() {
        let server = make_server(ServerConfig::default());
        server.spawn_idle_reaper(Duration::from_secs(60), Duration::from_secs(1));
        assert_eq!(server.shutdown().tracked(), 1);
        server
            .shutdown()
            .graceful_shutdown(Some(Duration::from_secs(5)))
            .await;
        assert_eq!(server.shutdown().tracked(), 0);
    }
}
