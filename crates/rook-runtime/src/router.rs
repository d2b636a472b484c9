//! Outbound fan-out to session participants.
//!
//! The router never blocks. Transports enqueue frames and report whether the
//! recipient accepted them; a slow or closed recipient never stalls the
//! session that produced the event.

use std::sync::Arc;

use tracing::debug;

use rook_core::protocol::{MembershipChange, ServerMessage};
use rook_core::{ConnectionId, GameError, GameResult, GameState, Role, SessionId};

/// Delivery seam between the runtime and the wire.
///
/// Sends are fire-and-forget. Implementations must not block: they either
/// enqueue the frame or drop it and return `false`.
pub trait Transport: Send + Sync {
    /// Deliver to one connection. `false` if it was dropped.
    fn send(&self, connection_id: &ConnectionId, message: &ServerMessage) -> bool;

    /// Subscribe a connection to a session's room.
    fn join_room(&self, connection_id: &ConnectionId, session_id: &SessionId);

    /// Unsubscribe a connection from a session's room.
    fn leave_room(&self, connection_id: &ConnectionId, session_id: &SessionId);

    /// Deliver to every member of a room. Returns the number of recipients
    /// that accepted the frame.
    fn broadcast(&self, session_id: &SessionId, message: &ServerMessage) -> usize;
}

/// Result of one applied move, as broadcast to the room.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Session the move was applied to.
    pub session_id: SessionId,
    /// State after the move.
    pub state: GameState,
    /// Canonical notation of the move.
    pub last_move: String,
    /// Role that owns the next move.
    pub turn: Role,
    /// Length of the move log after the move.
    pub move_number: usize,
    /// Set when the move ended the game.
    pub result: Option<GameResult>,
}

/// Turns runtime events into frames for the transport.
#[derive(Clone)]
pub struct BroadcastRouter {
    transport: Arc<dyn Transport>,
}

impl BroadcastRouter {
    /// Wrap a transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Announce an applied move: `stateUpdate`, then `gameOver` if terminal.
    ///
    /// Must be called while the session token is held so that frames from
    /// successive moves reach every participant in application order.
    pub fn move_applied(&self, outcome: &MoveOutcome) {
        let delivered = self.transport.broadcast(
            &outcome.session_id,
            &ServerMessage::StateUpdate {
                session_id: outcome.session_id.clone(),
                state: outcome.state.clone(),
                last_move: outcome.last_move.clone(),
                turn: outcome.turn,
                move_number: outcome.move_number,
            },
        );
        debug!(
            session_id = %outcome.session_id,
            move_number = outcome.move_number,
            delivered,
            "state update broadcast"
        );

        if let Some(result) = outcome.result {
            let _ = self.transport.broadcast(
                &outcome.session_id,
                &ServerMessage::GameOver {
                    session_id: outcome.session_id.clone(),
                    result,
                },
            );
        }
    }

    /// Announce a join or leave to the room.
    pub fn membership_changed(
        &self,
        session_id: &SessionId,
        connection_id: &ConnectionId,
        role: Role,
        change: MembershipChange,
        participants: usize,
    ) {
        let _ = self.transport.broadcast(
            session_id,
            &ServerMessage::MembershipChanged {
                session_id: session_id.clone(),
                connection_id: connection_id.clone(),
                role,
                change,
                participants,
            },
        );
    }

    /// Send a direct reply to one connection.
    pub fn reply(&self, connection_id: &ConnectionId, message: &ServerMessage) -> bool {
        self.transport.send(connection_id, message)
    }

    /// Send an error frame to the connection whose request failed.
    pub fn error(&self, connection_id: &ConnectionId, err: &GameError) -> bool {
        self.transport.send(connection_id, &ServerMessage::from(err))
    }

    /// Subscribe a connection to session broadcasts.
    pub fn join_room(&self, connection_id: &ConnectionId, session_id: &SessionId) {
        self.transport.join_room(connection_id, session_id);
    }

    /// Unsubscribe a connection from session broadcasts.
    pub fn leave_room(&self, connection_id: &ConnectionId, session_id: &SessionId) {
        self.transport.leave_room(connection_id, session_id);
    }

    /// Underlying transport.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingTransport;

    fn outcome(result: Option<GameResult>) -> MoveOutcome {
        MoveOutcome {
            session_id: SessionId::from("s1"),
            state: GameState::new("after"),
            last_move: "e4".into(),
            turn: Role::B,
            move_number: 1,
            result,
        }
    }

    fn room() -> (Arc<RecordingTransport>, BroadcastRouter) {
        let transport = Arc::new(RecordingTransport::new());
        let router = BroadcastRouter::new(transport.clone());
        router.join_room(&ConnectionId::from("a"), &SessionId::from("s1"));
        router.join_room(&ConnectionId::from("b"), &SessionId::from("s1"));
        (transport, router)
    }

    #[test]
    fn ongoing_move_sends_only_state_update() {
        let (transport, router) = room();
        router.move_applied(&outcome(None));
        for conn in ["a", "b"] {
            assert_eq!(transport.kinds_for(&ConnectionId::from(conn)), vec!["stateUpdate"]);
        }
    }

    #[test]
    fn terminal_move_sends_game_over_after_state_update() {
        let (transport, router) = room();
        router.move_applied(&outcome(Some(GameResult::Draw)));
        assert_eq!(
            transport.kinds_for(&ConnectionId::from("a")),
            vec!["stateUpdate", "gameOver"]
        );
    }

    #[test]
    fn error_goes_to_requester_only() {
        let (transport, router) = room();
        assert!(router.error(&ConnectionId::from("a"), &GameError::NotYourTurn));
        assert_eq!(transport.kinds_for(&ConnectionId::from("a")), vec!["error"]);
        assert!(transport.messages_for(&ConnectionId::from("b")).is_empty());
    }

    #[test]
    fn left_connection_stops_receiving() {
        let (transport, router) = room();
        router.leave_room(&ConnectionId::from("b"), &SessionId::from("s1"));
        router.membership_changed(
            &SessionId::from("s1"),
            &ConnectionId::from("b"),
            Role::B,
            MembershipChange::Left,
            1,
        );
        assert_eq!(transport.kinds_for(&ConnectionId::from("a")), vec!["membershipChanged"]);
        assert!(transport.messages_for(&ConnectionId::from("b")).is_empty());
    }
}
