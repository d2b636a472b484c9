//! WebSocket connection lifecycle. Handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use rook_core::ConnectionId;
use rook_core::protocol::ServerMessage;
use rook_runtime::GameHub;

use super::broadcast::BroadcastManager;
use super::connection::ClientConnection;
use super::handler::handle_frame;
use crate::config::ServerConfig;

/// How long the writer gets to flush a close frame after the reader stops.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Run a WebSocket connection for a connected client.
///
/// 1. Queues a `connected` message carrying the connection ID
/// 2. Dispatches incoming text frames through the hub
/// 3. Forwards outbound frames from the send channel
/// 4. Sends periodic Ping frames and drops unresponsive clients
/// 5. Stops when the server shuts down
/// 6. Unbinds the connection on disconnect; its session stays live
#[instrument(skip_all, fields(conn_id = %connection_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    connection_id: ConnectionId,
    hub: Arc<GameHub>,
    broadcast: Arc<BroadcastManager>,
    config: ServerConfig,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(config.send_buffer.max(1));
    let connection = Arc::new(ClientConnection::new(connection_id.clone(), send_tx));

    let connection_start = Instant::now();
    info!("client connected");
    counter!("ws_connections_total").increment(1);
    gauge!("ws_connections_active").increment(1.0);

    broadcast.add(connection.clone());
    let _ = connection.send_message(&ServerMessage::Connected {
        connection_id: connection_id.clone(),
    });

    let ping_every = config.ping_interval();
    let pong_timeout = config.pong_timeout();
    let outbound_conn = connection.clone();
    let mut outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(ping_every);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    let Some(text) = frame else { break };
                    if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if !outbound_conn.check_alive() && outbound_conn.last_pong_elapsed() > pong_timeout {
                        warn!(timeout = ?pong_timeout, "client unresponsive, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
                () = outbound_conn.closed() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        outbound_conn.close();
    });

    loop {
        let frame = tokio::select! {
            frame = ws_rx.next() => frame,
            () = connection.closed() => break,
            () = shutdown.cancelled() => break,
        };
        let Some(Ok(msg)) = frame else { break };

        let text = match msg {
            Message::Text(ref t) => Some(t.as_str().to_owned()),
            Message::Binary(ref data) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    Some(s.to_owned())
                } else {
                    debug!(len = data.len(), "received non-UTF8 binary frame");
                    None
                }
            }
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                None
            }
        };

        let Some(text) = text else { continue };
        connection.mark_alive();
        handle_frame(&text, &connection_id, &hub).await;
    }

    info!(
        dropped = connection.drop_count(),
        age_secs = connection.age().as_secs(),
        "client disconnected"
    );
    counter!("ws_disconnections_total").increment(1);
    gauge!("ws_connections_active").decrement(1.0);
    histogram!("ws_connection_duration_seconds").record(connection_start.elapsed().as_secs_f64());
    connection.close();
    if tokio::time::timeout(CLOSE_GRACE, &mut outbound).await.is_err() {
        outbound.abort();
    }
    broadcast.remove(&connection_id);
    hub.disconnect(&connection_id).await;
}
