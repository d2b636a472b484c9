//! # rook-chess
//!
//! Standard chess as a move-legality oracle, built on `shakmaty`.
//! State is a FEN string; moves may be UCI or SAN.

#![deny(unsafe_code)]

pub mod engine;
pub mod oracle;

pub use engine::{ChessError, ChessPosition, Outcome, PlayedMove};
pub use oracle::ChessOracle;
