//! WebSocket message dispatch. Parses incoming text as a `ClientMessage`
//! and routes it through the [`GameHub`].

use tracing::{debug, instrument, warn};

use rook_core::ConnectionId;
use rook_core::protocol::{ClientMessage, parse_client_message};
use rook_runtime::GameHub;

fn request_kind(message: &ClientMessage) -> &'static str {
    match message {
        ClientMessage::CreateSession => "createSession",
        ClientMessage::JoinSession { .. } => "joinSession",
        ClientMessage::Move { .. } => "move",
        ClientMessage::LeaveSession => "leaveSession",
        ClientMessage::Ping => "ping",
    }
}

/// Handle one inbound text frame.
///
/// Replies and broadcasts go out through the hub's transport; a frame that
/// does not decode gets an `INVALID_MESSAGE` error back.
#[instrument(skip_all, fields(conn_id = %connection_id, kind))]
pub async fn handle_frame(text: &str, connection_id: &ConnectionId, hub: &GameHub) {
    let message = match parse_client_message(text) {
        Ok(m) => m,
        Err(e) => {
            warn!(len = text.len(), "invalid frame received");
            hub.reject(connection_id, &e);
            return;
        }
    };
    let kind = request_kind(&message);
    let _ = tracing::Span::current().record("kind", kind);
    debug!(kind, "dispatching request");
    hub.handle(connection_id, message).await;
}
