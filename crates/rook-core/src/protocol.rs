//! Client and server message envelopes.
//!
//! Every frame is a JSON object tagged by `type`. Field names are camelCase
//! on the wire.

use serde::{Deserialize, Serialize};

use crate::errors::GameError;
use crate::game::{GameResult, GameState, MoveInput, Role, SessionStatus};
use crate::ids::{ConnectionId, SessionId};

/// A move as submitted by a client, before normalization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MovePayload {
    /// Notation string such as `"e2e4"` or `"Nf3"`.
    Notation(String),
    /// Coordinate object.
    Coordinates {
        /// Origin square.
        from: String,
        /// Destination square.
        to: String,
        /// Promotion piece letter.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        promotion: Option<String>,
    },
}

impl TryFrom<MovePayload> for MoveInput {
    type Error = GameError;

    fn try_from(payload: MovePayload) -> Result<Self, Self::Error> {
        match payload {
            MovePayload::Notation(raw) => MoveInput::from_notation(&raw),
            MovePayload::Coordinates {
                from,
                to,
                promotion,
            } => MoveInput::from_coordinates(&from, &to, promotion.as_deref()),
        }
    }
}

/// Inbound client messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Start a new session and take seat A.
    CreateSession,
    /// Join an existing session.
    JoinSession {
        /// Session to join.
        session_id: SessionId,
    },
    /// Submit a move in the bound session.
    Move {
        /// The move, as a notation string or coordinate object.
        #[serde(rename = "move")]
        mv: MovePayload,
        /// Optional guard: rejected with `NOT_BOUND` unless it names the bound session.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
    },
    /// Leave the bound session.
    LeaveSession,
    /// Application-level keepalive.
    Ping,
}

/// Parse a raw text frame into a [`ClientMessage`].
pub fn parse_client_message(text: &str) -> Result<ClientMessage, GameError> {
    serde_json::from_str(text).map_err(|e| GameError::InvalidMessage(e.to_string()))
}

/// Direction of a membership change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipChange {
    /// A participant was bound.
    Joined,
    /// A participant was unbound.
    Left,
}

/// Outbound server messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// First frame on every connection.
    Connected {
        /// Identity assigned to this connection.
        connection_id: ConnectionId,
    },
    /// Reply to `createSession`.
    SessionCreated {
        /// The new session.
        session_id: SessionId,
        /// Seat taken by the creator.
        role: Role,
    },
    /// Reply to `joinSession`.
    SessionJoined {
        /// Joined session.
        session_id: SessionId,
        /// Seat assigned.
        role: Role,
        /// Current game state.
        state: GameState,
        /// Role that owns the next move.
        turn: Role,
        /// Lifecycle status after the join.
        status: SessionStatus,
    },
    /// Reply to `leaveSession`.
    SessionLeft {
        /// Session that was left.
        session_id: SessionId,
    },
    /// A move was applied.
    StateUpdate {
        /// Session the move belongs to.
        session_id: SessionId,
        /// State after the move.
        state: GameState,
        /// The applied move in canonical notation.
        last_move: String,
        /// Role that owns the next move.
        turn: Role,
        /// Length of the move log.
        move_number: usize,
    },
    /// The session reached a terminal result.
    GameOver {
        /// Completed session.
        session_id: SessionId,
        /// Final result.
        result: GameResult,
    },
    /// A participant joined or left.
    MembershipChanged {
        /// Affected session.
        session_id: SessionId,
        /// Connection that joined or left.
        connection_id: ConnectionId,
        /// Seat of that connection.
        role: Role,
        /// Joined or left.
        change: MembershipChange,
        /// Participants bound after the change.
        participants: usize,
    },
    /// Reply to `ping`.
    Pong,
    /// A request from this connection failed.
    Error {
        /// Machine-readable code.
        code: String,
        /// Human-readable message.
        message: String,
    },
}

impl ServerMessage {
    /// Wire `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::SessionCreated { .. } => "sessionCreated",
            Self::SessionJoined { .. } => "sessionJoined",
            Self::SessionLeft { .. } => "sessionLeft",
            Self::StateUpdate { .. } => "stateUpdate",
            Self::GameOver { .. } => "gameOver",
            Self::MembershipChanged { .. } => "membershipChanged",
            Self::Pong => "pong",
            Self::Error { .. } => "error",
        }
    }
}

impl From<&GameError> for ServerMessage {
    fn from(err: &GameError) -> Self {
        Self::Error {
            code: err.code().to_owned(),
            message: err.client_message(),
        }
    }
}
