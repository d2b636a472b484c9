//! WebSocket client connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use rook_core::protocol::ServerMessage;
use rook_core::{ConnectionId, SessionId};

/// A connected WebSocket client.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Session room this connection receives broadcasts for.
    room: Mutex<Option<SessionId>>,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client has responded since the last ping.
    is_alive: AtomicBool,
    /// When the last pong (or any inbound frame) was received.
    last_pong: Mutex<Instant>,
    /// Frames dropped because the channel was full or closed.
    dropped_messages: AtomicU64,
    /// Fires when the server decides to drop this client.
    closed: CancellationToken,
}

impl ClientConnection {
    /// Create a new connection.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            room: Mutex::new(None),
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            closed: CancellationToken::new(),
        }
    }

    /// Subscribe to a session's broadcasts, replacing any previous room.
    pub fn join_room(&self, session_id: &SessionId) {
        *self.room.lock() = Some(session_id.clone());
    }

    /// Leave `session_id`'s room if this connection is in it.
    pub fn leave_room(&self, session_id: &SessionId) {
        let mut room = self.room.lock();
        if room.as_ref() == Some(session_id) {
            *room = None;
        }
    }

    /// Whether this connection receives broadcasts for `session_id`.
    pub fn in_room(&self, session_id: &SessionId) -> bool {
        self.room.lock().as_ref() == Some(session_id)
    }

    /// Current room.
    pub fn room(&self) -> Option<SessionId> {
        self.room.lock().clone()
    }

    /// Enqueue a text frame.
    ///
    /// Returns `false` if the channel is full or closed, and increments
    /// the dropped message counter.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize and enqueue a server message.
    pub fn send_message(&self, message: &ServerMessage) -> bool {
        match serde_json::to_string(message) {
            Ok(json) => self.send(Arc::new(json)),
            Err(e) => {
                warn!(conn_id = %self.id, kind = message.kind(), error = %e, "failed to serialize message");
                false
            }
        }
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Mark the connection as alive (pong or other inbound frame).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Time since the last pong (or connection establishment).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Check and reset the alive flag for the next ping cycle.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Ask the connection's session loop to shut the socket.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether [`ClientConnection::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once [`ClientConnection::close`] is called.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
