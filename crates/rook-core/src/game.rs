//! Game vocabulary shared by the runtime, the store, and the oracle.
//!
//! The runtime never interprets game rules. It carries an opaque
//! [`GameState`] produced by the oracle, a canonical [`MoveInput`], and the
//! seat each participant occupies ([`Role`]).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::GameError;

/// Seat a participant occupies in a two-party session.
///
/// Roles are handed out strictly in join order: the first binding gets
/// `A`, the second gets `B`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// First participant.
    A,
    /// Second participant.
    B,
}

impl Role {
    /// Both roles in seating order.
    pub const ALL: [Role; 2] = [Role::A, Role::B];

    /// The opposing role.
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    /// Wire and storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created, only one participant seated so far.
    WaitingForOpponent,
    /// Both seats have been filled at least once.
    InProgress,
    /// The oracle reported a terminal result. No further moves.
    Completed,
}

impl SessionStatus {
    /// Storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WaitingForOpponent => "waiting_for_opponent",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting_for_opponent" => Ok(Self::WaitingForOpponent),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(GameError::Internal(format!("unknown session status: {other}"))),
        }
    }
}

/// Oracle verdict on whether a state ends the game.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminalResult {
    /// Play continues.
    Ongoing,
    /// The given role won.
    Winner(Role),
    /// Nobody won.
    Draw,
}

impl TerminalResult {
    /// Collapse into the persisted result, `None` while the game is ongoing.
    pub fn into_result(self) -> Option<GameResult> {
        match self {
            Self::Ongoing => None,
            Self::Winner(winner) => Some(GameResult::Win { winner }),
            Self::Draw => Some(GameResult::Draw),
        }
    }
}

/// Final result of a completed session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum GameResult {
    /// One role won.
    Win {
        /// The winning role.
        winner: Role,
    },
    /// Drawn game.
    Draw,
}

impl GameResult {
    /// Storage representation: the winning role, or `draw`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Win { winner } => winner.as_str(),
            Self::Draw => "draw",
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Win { winner } => write!(f, "{winner} wins"),
            Self::Draw => f.write_str("draw"),
        }
    }
}

impl FromStr for GameResult {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Self::Win { winner: Role::A }),
            "B" => Ok(Self::Win { winner: Role::B }),
            "draw" => Ok(Self::Draw),
            other => Err(GameError::Internal(format!("unknown game result: {other}"))),
        }
    }
}

/// Opaque serialized game state, produced and consumed only by the oracle.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameState(String);

impl GameState {
    /// Wrap an oracle-produced state string.
    pub fn new(state: impl Into<String>) -> Self {
        Self(state.into())
    }

    /// Borrow the serialized state.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the serialized state.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical move description handed to the oracle.
///
/// Clients may submit a notation string (`"e2e4"`, `"Nf3"`) or a coordinate
/// object (`{from, to, promotion}`). Both are normalized here so the
/// coordinator and oracle only ever see one shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoveInput(String);

impl MoveInput {
    /// Normalize a free-form notation string.
    ///
    /// Surrounding whitespace is trimmed. Empty or non-ASCII input is rejected
    /// before it reaches the oracle; anything else is the oracle's to judge.
    pub fn from_notation(raw: &str) -> Result<Self, GameError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(GameError::InvalidMove("empty move".into()));
        }
        if !trimmed.is_ascii() {
            return Err(GameError::InvalidMove(format!("unrecognized move: {trimmed}")));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Normalize a coordinate move into lowercase coordinate notation.
    pub fn from_coordinates(
        from: &str,
        to: &str,
        promotion: Option<&str>,
    ) -> Result<Self, GameError> {
        let from = normalize_square(from)?;
        let to = normalize_square(to)?;
        let mut notation = format!("{from}{to}");
        if let Some(piece) = promotion.map(str::trim).filter(|p| !p.is_empty()) {
            let mut chars = piece.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphabetic() => {
                    notation.push(c.to_ascii_lowercase());
                }
                _ => {
                    return Err(GameError::InvalidMove(format!(
                        "unrecognized promotion piece: {piece}"
                    )));
                }
            }
        }
        Ok(Self(notation))
    }

    /// Borrow the canonical notation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MoveInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_square(raw: &str) -> Result<String, GameError> {
    let square = raw.trim().to_ascii_lowercase();
    let mut chars = square.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(file), Some(rank), None) if file.is_ascii_lowercase() && rank.is_ascii_digit() => {
            Ok(square)
        }
        _ => Err(GameError::InvalidMove(format!("unrecognized square: {}", raw.trim()))),
    }
}
