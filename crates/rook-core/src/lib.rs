//! # rook-core
//!
//! Foundation types shared by every rook crate:
//!
//! - **Branded IDs**: `SessionId`, `ConnectionId` as newtypes for type safety
//! - **Game vocabulary**: `Role`, `SessionStatus`, `GameResult`, `GameState`, `MoveInput`
//! - **Oracle contract**: the [`oracle::MoveOracle`] trait consulted for game rules
//! - **Errors**: [`errors::GameError`] with stable wire codes
//! - **Protocol**: client and server message envelopes
//! - **Logging**: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod errors;
pub mod game;
pub mod ids;
pub mod logging;
pub mod oracle;
pub mod protocol;

pub use errors::GameError;
pub use game::{GameResult, GameState, MoveInput, Role, SessionStatus, TerminalResult};
pub use ids::{ConnectionId, SessionId};
pub use oracle::{AppliedMove, MoveOracle, MoveVerdict, OracleError};
