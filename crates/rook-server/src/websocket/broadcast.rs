//! Room fan-out to connected WebSocket clients.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::counter;
use parking_lot::RwLock;
use tracing::{debug, warn};

use rook_core::protocol::ServerMessage;
use rook_core::{ConnectionId, SessionId};
use rook_runtime::Transport;

use super::connection::ClientConnection;

/// Maximum total lifetime message drops before forcibly disconnecting a slow client.
const MAX_TOTAL_DROPS: u64 = 100;

/// Tracks live connections and delivers server messages to them.
pub struct BroadcastManager {
    /// Connected clients indexed by connection ID.
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
    /// Connection count readable without taking the lock.
    active_count: AtomicUsize,
}

impl BroadcastManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Add a connection.
    pub fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write();
        if conns.insert(connection.id.clone(), connection).is_none() {
            let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove a connection by ID.
    pub fn remove(&self, connection_id: &ConnectionId) {
        let mut conns = self.connections.write();
        if conns.remove(connection_id).is_some() {
            let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Look up a connection.
    pub fn get(&self, connection_id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.read().get(connection_id).cloned()
    }

    /// Number of active connections.
    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Serialize once, fan out to matching clients, evict slow clients.
    fn broadcast_to(
        &self,
        filter: impl Fn(&ClientConnection) -> bool,
        message: &ServerMessage,
        label: &str,
    ) -> usize {
        let json = match serde_json::to_string(message) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(kind = message.kind(), error = %e, "failed to serialize message");
                return 0;
            }
        };
        let mut delivered = 0;
        let mut to_remove = Vec::new();
        {
            let conns = self.connections.read();
            for conn in conns.values().filter(|c| filter(c)) {
                if conn.send(Arc::clone(&json)) {
                    delivered += 1;
                    continue;
                }
                counter!("ws_broadcast_drops_total").increment(1);
                let drops = conn.drop_count();
                if drops >= MAX_TOTAL_DROPS {
                    warn!(conn_id = %conn.id, label, drops, "disconnecting slow client");
                    to_remove.push(Arc::clone(conn));
                } else {
                    warn!(conn_id = %conn.id, label, total_drops = drops, "failed to send message to client (channel full)");
                }
            }
        }
        debug!(kind = message.kind(), label, delivered, "broadcast message");
        for conn in to_remove {
            self.remove(&conn.id);
            conn.close();
        }
        delivered
    }
}

impl Default for BroadcastManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for BroadcastManager {
    fn send(&self, connection_id: &ConnectionId, message: &ServerMessage) -> bool {
        match self.get(connection_id) {
            Some(conn) => conn.send_message(message),
            None => {
                debug!(conn_id = %connection_id, kind = message.kind(), "send to unknown connection");
                false
            }
        }
    }

    fn join_room(&self, connection_id: &ConnectionId, session_id: &SessionId) {
        if let Some(conn) = self.get(connection_id) {
            conn.join_room(session_id);
        }
    }

    fn leave_room(&self, connection_id: &ConnectionId, session_id: &SessionId) {
        if let Some(conn) = self.get(connection_id) {
            conn.leave_room(session_id);
        }
    }

    fn broadcast(&self, session_id: &SessionId, message: &ServerMessage) -> usize {
        self.broadcast_to(|c| c.in_room(session_id), message, session_id)
    }
}
