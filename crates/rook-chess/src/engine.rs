//! Thin wrapper over a `shakmaty` position.
//!
//! Positions travel as FEN strings. Moves are accepted in UCI (`e2e4`,
//! `e7e8q`) or SAN (`Nf3`, `O-O`, `exd5+`).

use shakmaty::fen::Fen;
use shakmaty::san::{SanPlus, Suffix};
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position};
use thiserror::Error;

/// Errors raised while decoding positions or resolving moves.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChessError {
    /// The FEN string did not describe a legal position.
    #[error("invalid FEN: {0}")]
    InvalidFen(String),

    /// The move text parsed as neither UCI nor SAN.
    #[error("unrecognized move notation: {0}")]
    Unparsable(String),

    /// The move parsed but is not legal in this position.
    #[error("illegal move: {0}")]
    IllegalMove(String),
}

/// How a position ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The given color delivered mate.
    Checkmate(Color),
    /// Side to move has no legal move and is not in check.
    Stalemate,
    /// Neither side can force mate.
    InsufficientMaterial,
    /// A hundred half-moves without a capture or pawn move.
    FiftyMoveRule,
}

const FIFTY_MOVE_HALFMOVES: u32 = 100;

/// Longer than any UCI or SAN move, check suffix included.
const MAX_NOTATION_LEN: usize = 16;

/// A move resolved against a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedMove {
    /// Standard algebraic notation with check suffix, e.g. `Qh4#`.
    pub san: String,
    /// Coordinate notation, e.g. `d8h4`.
    pub uci: String,
}

/// A chess position.
#[derive(Debug, Clone, Default)]
pub struct ChessPosition {
    position: Chess,
}

impl ChessPosition {
    /// Standard starting position.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a FEN string.
    pub fn from_fen(fen: &str) -> Result<Self, ChessError> {
        let fen: Fen = fen
            .trim()
            .parse()
            .map_err(|e| ChessError::InvalidFen(format!("{e}")))?;
        let position: Chess = fen
            .into_position(CastlingMode::Standard)
            .map_err(|e| ChessError::InvalidFen(format!("{e}")))?;
        Ok(Self { position })
    }

    /// Encode as FEN.
    pub fn to_fen(&self) -> String {
        Fen::from_position(&self.position, EnPassantMode::Legal).to_string()
    }

    /// Side to move.
    pub fn turn(&self) -> Color {
        self.position.turn()
    }

    /// Whether the side to move is in check.
    pub fn is_check(&self) -> bool {
        self.position.is_check()
    }

    /// Terminal outcome, `None` while play continues.
    pub fn outcome(&self) -> Option<Outcome> {
        if self.position.is_checkmate() {
            // The side to move is mated, so the other color won.
            Some(Outcome::Checkmate(!self.turn()))
        } else if self.position.is_stalemate() {
            Some(Outcome::Stalemate)
        } else if self.position.is_insufficient_material() {
            Some(Outcome::InsufficientMaterial)
        } else if self.position.halfmoves() >= FIFTY_MOVE_HALFMOVES {
            Some(Outcome::FiftyMoveRule)
        } else {
            None
        }
    }

    /// Number of legal moves for the side to move.
    pub fn legal_move_count(&self) -> usize {
        self.position.legal_moves().len()
    }

    /// Legal moves in UCI notation.
    pub fn legal_moves_uci(&self) -> Vec<String> {
        self.position
            .legal_moves()
            .iter()
            .map(|m| UciMove::from_move(*m, CastlingMode::Standard).to_string())
            .collect()
    }

    /// Resolve and play a move, returning the new position.
    pub fn play(&self, notation: &str) -> Result<(Self, PlayedMove), ChessError> {
        let m = self.resolve(notation)?;
        let san = SanPlus::from_move(self.position.clone(), m).to_string();
        let uci = UciMove::from_move(m, CastlingMode::Standard).to_string();
        let position = self
            .position
            .clone()
            .play(m)
            .map_err(|_| ChessError::IllegalMove(notation.to_owned()))?;
        Ok((Self { position }, PlayedMove { san, uci }))
    }

    fn resolve(&self, notation: &str) -> Result<Move, ChessError> {
        if notation.len() > MAX_NOTATION_LEN {
            return Err(ChessError::Unparsable(notation.to_owned()));
        }
        if let Ok(uci) = notation.parse::<UciMove>() {
            return uci
                .to_move(&self.position)
                .map_err(|_| ChessError::IllegalMove(notation.to_owned()));
        }
        let san: SanPlus = notation
            .parse()
            .map_err(|_| ChessError::Unparsable(notation.to_owned()))?;
        let m = san
            .san
            .to_move(&self.position)
            .map_err(|_| ChessError::IllegalMove(notation.to_owned()))?;
        if let Some(claimed) = san.suffix {
            let actual = Suffix::from_position(&self.position.clone().play(m).map_err(|_| {
                ChessError::IllegalMove(notation.to_owned())
            })?);
            if actual != Some(claimed) {
                return Err(ChessError::IllegalMove(notation.to_owned()));
            }
        }
        Ok(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn starting_position() {
        let pos = ChessPosition::new();
        assert_eq!(pos.turn(), Color::White);
        assert!(!pos.is_check());
        assert!(pos.outcome().is_none());
        assert_eq!(pos.legal_move_count(), 20);
    }

    #[test]
    fn fen_roundtrip() {
        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
        let pos = ChessPosition::from_fen(fen).unwrap();
        assert_eq!(pos.turn(), Color::Black);
        assert_eq!(pos.to_fen(), fen);
    }

    #[test]
    fn invalid_fen() {
        assert_matches!(
            ChessPosition::from_fen("not a valid fen"),
            Err(ChessError::InvalidFen(_))
        );
    }

    #[test]
    fn play_uci_and_san() {
        let pos = ChessPosition::new();
        let (pos, played) = pos.play("e2e4").unwrap();
        assert_eq!(played.san, "e4");
        assert_eq!(played.uci, "e2e4");
        assert_eq!(pos.turn(), Color::Black);

        let (pos, played) = pos.play("e5").unwrap();
        assert_eq!(played.uci, "e7e5");

        let (_, played) = pos.play("Nf3").unwrap();
        assert_eq!(played.san, "Nf3");
        assert_eq!(played.uci, "g1f3");
    }

    #[test]
    fn illegal_uci_move() {
        let pos = ChessPosition::new();
        assert_matches!(pos.play("e2e5"), Err(ChessError::IllegalMove(_)));
        assert_matches!(pos.play("e7e5"), Err(ChessError::IllegalMove(_)));
    }

    #[test]
    fn unparsable_move() {
        let pos = ChessPosition::new();
        assert_matches!(pos.play("hello"), Err(ChessError::Unparsable(_)));
    }

    #[test]
    fn wrong_check_suffix_rejected() {
        let pos = ChessPosition::new();
        assert_matches!(pos.play("e4+"), Err(ChessError::IllegalMove(_)));
    }

    #[test]
    fn fools_mate() {
        let mut pos = ChessPosition::new();
        for mv in ["f2f3", "e7e5", "g2g4"] {
            pos = pos.play(mv).unwrap().0;
        }
        let (pos, played) = pos.play("d8h4").unwrap();
        assert_eq!(played.san, "Qh4#");
        assert!(pos.is_check());
        assert_eq!(pos.outcome(), Some(Outcome::Checkmate(Color::Black)));
    }

    #[test]
    fn stalemate_detected() {
        let pos = ChessPosition::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert_eq!(pos.outcome(), Some(Outcome::Stalemate));
    }

    #[test]
    fn insufficient_material_detected() {
        let pos = ChessPosition::from_fen("8/8/8/4k3/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(pos.outcome(), Some(Outcome::InsufficientMaterial));
    }

    #[test]
    fn overlong_notation_is_unparsable() {
        let raw = "e2e4".repeat(10);
        assert_matches!(ChessPosition::new().play(&raw), Err(ChessError::Unparsable(_)));
    }

    #[test]
    fn fifty_move_rule_needs_a_full_clock() {
        let pos = ChessPosition::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 99 80").unwrap();
        assert_eq!(pos.outcome(), None);
        let pos = ChessPosition::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 100 80").unwrap();
        assert_eq!(pos.outcome(), Some(Outcome::FiftyMoveRule));
    }

    #[test]
    fn mate_outranks_the_fifty_move_rule() {
        let pos = ChessPosition::from_fen("R3k3/8/4K3/8/8/8/8/8 b - - 100 80").unwrap();
        assert_eq!(pos.outcome(), Some(Outcome::Checkmate(Color::White)));
    }
}
