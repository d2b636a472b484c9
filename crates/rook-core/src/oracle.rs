//! Move-legality oracle contract.
//!
//! The runtime consults an oracle for everything rule-related: the initial
//! state, whether a move is legal, whose turn it is, and whether the game is
//! over. Oracle calls are synchronous and pure with respect to the state they
//! are given.

use crate::errors::GameError;
use crate::game::{GameState, MoveInput, Role, TerminalResult};

/// A move the oracle accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedMove {
    /// State after the move.
    pub state: GameState,
    /// Canonical notation recorded in the move log and broadcast as `lastMove`.
    pub notation: String,
}

/// Oracle verdict for a submitted move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveVerdict {
    /// The move is legal; the new state is attached.
    Legal(AppliedMove),
    /// The move is not legal in the given state.
    Illegal {
        /// Human-readable reason.
        reason: String,
    },
}

/// Oracle faults. Distinct from an illegal move: the oracle could not judge.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// The stored state could not be decoded.
    #[error("corrupt game state: {0}")]
    CorruptState(String),

    /// Any other oracle failure.
    #[error("oracle failure: {0}")]
    Internal(String),
}

impl From<OracleError> for GameError {
    fn from(err: OracleError) -> Self {
        Self::Oracle(err.to_string())
    }
}

/// Game rules consulted by the move coordinator.
pub trait MoveOracle: Send + Sync {
    /// Initial state of a fresh game.
    fn new_game(&self) -> GameState;

    /// Judge `input` against `state`.
    fn apply_move(&self, state: &GameState, input: &MoveInput) -> Result<MoveVerdict, OracleError>;

    /// Role that owns the next move in `state`.
    fn turn_of(&self, state: &GameState) -> Result<Role, OracleError>;

    /// Whether `state` ends the game, and how.
    fn terminal_result(&self, state: &GameState) -> Result<TerminalResult, OracleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_error_maps_to_internal_code() {
        let err: GameError = OracleError::CorruptState("not a fen".into()).into();
        assert_eq!(err.code(), crate::errors::INTERNAL_ERROR);
        assert!(err.to_string().contains("not a fen"));
    }
}
