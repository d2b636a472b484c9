//! Connection-to-session bindings and seat assignment.
//!
//! Both directions of the mapping live behind one short-lived lock so a bind
//! can check capacity and claim a seat atomically.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use rook_core::{ConnectionId, GameError, Role, SessionId};

/// Outcome of a successful [`ConnectionBinding::bind`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bound {
    /// Seat assigned to the connection.
    pub role: Role,
    /// Participants bound to the session after the call.
    pub participants: usize,
    /// `false` when the connection already held this seat.
    pub newly_bound: bool,
    /// Binding released because the connection moved here from another session.
    pub released: Option<Unbound>,
}

/// A binding that was removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unbound {
    /// Session the connection was bound to.
    pub session_id: SessionId,
    /// Seat it held.
    pub role: Role,
    /// Participants left in that session.
    pub remaining: usize,
}

#[derive(Default)]
struct Seats {
    by_connection: HashMap<ConnectionId, (SessionId, Role)>,
    by_session: HashMap<SessionId, [Option<ConnectionId>; 2]>,
}

impl Seats {
    fn release(&mut self, connection_id: &ConnectionId) -> Option<Unbound> {
        let (session_id, role) = self.by_connection.remove(connection_id)?;
        let mut remaining = 0;
        if let Some(seats) = self.by_session.get_mut(&session_id) {
            seats[seat_index(role)] = None;
            remaining = seats.iter().flatten().count();
            if remaining == 0 {
                let _ = self.by_session.remove(&session_id);
            }
        }
        Some(Unbound {
            session_id,
            role,
            remaining,
        })
    }
}

fn seat_index(role: Role) -> usize {
    match role {
        Role::A => 0,
        Role::B => 1,
    }
}

/// Map from live connections to `(session, role)`.
#[derive(Default)]
pub struct ConnectionBinding {
    seats: Mutex<Seats>,
}

impl ConnectionBinding {
    /// Create an empty binding map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seat `connection_id` in `session_id`.
    ///
    /// The first free seat in join order is assigned (`A`, then `B`). A
    /// connection bound to a different session is released from it first.
    /// Binding again to the session it already sits in returns its seat.
    pub fn bind(
        &self,
        connection_id: &ConnectionId,
        session_id: &SessionId,
    ) -> Result<Bound, GameError> {
        let mut seats = self.seats.lock();

        if let Some((current, role)) = seats.by_connection.get(connection_id) {
            if current == session_id {
                let role = *role;
                let participants = seats
                    .by_session
                    .get(session_id)
                    .map_or(0, |s| s.iter().flatten().count());
                return Ok(Bound {
                    role,
                    participants,
                    newly_bound: false,
                    released: None,
                });
            }
        }

        let free = seats
            .by_session
            .get(session_id)
            .map_or(Some(Role::A), |s| {
                Role::ALL.into_iter().find(|r| s[seat_index(*r)].is_none())
            });
        let Some(role) = free else {
            return Err(GameError::SessionFull(session_id.to_string()));
        };

        let released = seats.release(connection_id);
        let session_seats = seats.by_session.entry(session_id.clone()).or_default();
        session_seats[seat_index(role)] = Some(connection_id.clone());
        let participants = session_seats.iter().flatten().count();
        let _ = seats
            .by_connection
            .insert(connection_id.clone(), (session_id.clone(), role));

        debug!(
            connection_id = %connection_id,
            session_id = %session_id,
            role = %role,
            participants,
            "connection bound"
        );
        Ok(Bound {
            role,
            participants,
            newly_bound: true,
            released,
        })
    }

    /// Remove the connection's binding, if any. Idempotent.
    pub fn unbind(&self, connection_id: &ConnectionId) -> Option<Unbound> {
        let unbound = self.seats.lock().release(connection_id);
        if let Some(u) = &unbound {
            debug!(
                connection_id = %connection_id,
                session_id = %u.session_id,
                role = %u.role,
                remaining = u.remaining,
                "connection unbound"
            );
        }
        unbound
    }

    /// Session and seat the connection may act on.
    pub fn resolve(&self, connection_id: &ConnectionId) -> Option<(SessionId, Role)> {
        self.seats.lock().by_connection.get(connection_id).cloned()
    }

    /// Bound participants of a session in seat order.
    pub fn participants(&self, session_id: &SessionId) -> Vec<(ConnectionId, Role)> {
        self.seats
            .lock()
            .by_session
            .get(session_id)
            .map(|s| {
                Role::ALL
                    .into_iter()
                    .filter_map(|r| s[seat_index(r)].clone().map(|c| (c, r)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of connections bound to a session.
    pub fn participant_count(&self, session_id: &SessionId) -> usize {
        self.seats
            .lock()
            .by_session
            .get(session_id)
            .map_or(0, |s| s.iter().flatten().count())
    }

    /// Number of bound connections across all sessions.
    pub fn len(&self) -> usize {
        self.seats.lock().by_connection.len()
    }

    /// Whether no connection is bound.
    pub fn is_empty(&self) -> bool {
        self.seats.lock().by_connection.is_empty()
    }
}
