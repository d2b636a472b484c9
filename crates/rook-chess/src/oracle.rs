//! [`MoveOracle`] implementation for standard chess.
//!
//! White sits in seat `A`, black in seat `B`.

use rook_core::{
    AppliedMove, GameState, MoveInput, MoveOracle, MoveVerdict, OracleError, Role, TerminalResult,
};
use shakmaty::Color;
use tracing::trace;

use crate::engine::{ChessError, ChessPosition, Outcome};

/// Chess rules over FEN-encoded state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChessOracle;

impl ChessOracle {
    /// Create the oracle.
    pub fn new() -> Self {
        Self
    }

    fn position(state: &GameState) -> Result<ChessPosition, OracleError> {
        ChessPosition::from_fen(state.as_str()).map_err(|e| OracleError::CorruptState(e.to_string()))
    }
}

/// Seat that plays the given color.
pub fn role_for(color: Color) -> Role {
    match color {
        Color::White => Role::A,
        Color::Black => Role::B,
    }
}

impl MoveOracle for ChessOracle {
    fn new_game(&self) -> GameState {
        GameState::new(ChessPosition::new().to_fen())
    }

    fn apply_move(&self, state: &GameState, input: &MoveInput) -> Result<MoveVerdict, OracleError> {
        let position = Self::position(state)?;
        match position.play(input.as_str()) {
            Ok((next, played)) => {
                trace!(san = %played.san, uci = %played.uci, "move accepted");
                Ok(MoveVerdict::Legal(AppliedMove {
                    state: GameState::new(next.to_fen()),
                    notation: played.san,
                }))
            }
            Err(err @ (ChessError::IllegalMove(_) | ChessError::Unparsable(_))) => {
                Ok(MoveVerdict::Illegal {
                    reason: err.to_string(),
                })
            }
            Err(err @ ChessError::InvalidFen(_)) => Err(OracleError::CorruptState(err.to_string())),
        }
    }

    fn turn_of(&self, state: &GameState) -> Result<Role, OracleError> {
        Ok(role_for(Self::position(state)?.turn()))
    }

    fn terminal_result(&self, state: &GameState) -> Result<TerminalResult, OracleError> {
        Ok(match Self::position(state)?.outcome() {
            None => TerminalResult::Ongoing,
            Some(Outcome::Checkmate(winner)) => TerminalResult::Winner(role_for(winner)),
            Some(Outcome::Stalemate | Outcome::InsufficientMaterial | Outcome::FiftyMoveRule) => {
                TerminalResult::Draw
            }
        })
    }
}
