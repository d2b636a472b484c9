//! Session error taxonomy and wire error codes.

// ── Error code constants ────────────────────────────────────────────

/// Session does not exist in memory or in the store.
pub const SESSION_NOT_FOUND: &str = "SESSION_NOT_FOUND";
/// Both seats of the session are taken.
pub const SESSION_FULL: &str = "SESSION_FULL";
/// Connection is not bound to any session.
pub const NOT_BOUND: &str = "NOT_BOUND";
/// The submitting role does not own the current turn.
pub const NOT_YOUR_TURN: &str = "NOT_YOUR_TURN";
/// The oracle rejected the move.
pub const INVALID_MOVE: &str = "INVALID_MOVE";
/// The session already reached a terminal result.
pub const GAME_ALREADY_OVER: &str = "GAME_ALREADY_OVER";
/// Inbound frame could not be parsed.
pub const INVALID_MESSAGE: &str = "INVALID_MESSAGE";
/// Unexpected internal or collaborator failure.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// Errors surfaced by session operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// Session unknown to both the registry and the store.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A third participant tried to join.
    #[error("session is full: {0}")]
    SessionFull(String),

    /// The connection has no session binding.
    #[error("connection is not bound to a session")]
    NotBound,

    /// Out-of-turn submission (including before an opponent has joined).
    #[error("it is not your turn")]
    NotYourTurn,

    /// The oracle judged the move illegal, or it could not be normalized.
    #[error("invalid move: {0}")]
    InvalidMove(String),

    /// The session is completed.
    #[error("game is already over")]
    GameAlreadyOver,

    /// The inbound frame was not a recognizable message.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The store rejected a create or read.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A move was applied in memory but could not be made durable.
    #[error("persistence failed: {0}")]
    PersistenceFailed(String),

    /// The oracle faulted (as opposed to rejecting a move).
    #[error("oracle error: {0}")]
    Oracle(String),

    /// Any other unexpected failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GameError {
    /// Machine-readable wire code for this variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => SESSION_NOT_FOUND,
            Self::SessionFull(_) => SESSION_FULL,
            Self::NotBound => NOT_BOUND,
            Self::NotYourTurn => NOT_YOUR_TURN,
            Self::InvalidMove(_) => INVALID_MOVE,
            Self::GameAlreadyOver => GAME_ALREADY_OVER,
            Self::InvalidMessage(_) => INVALID_MESSAGE,
            Self::StoreUnavailable(_)
            | Self::PersistenceFailed(_)
            | Self::Oracle(_)
            | Self::Internal(_) => INTERNAL_ERROR,
        }
    }

    /// Whether the error was caused by the client's own request.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::StoreUnavailable(_)
                | Self::PersistenceFailed(_)
                | Self::Oracle(_)
                | Self::Internal(_)
        )
    }

    /// Message safe to send back to the client.
    ///
    /// Collaborator failures are reported generically; their detail stays in
    /// the server logs.
    pub fn client_message(&self) -> String {
        if self.is_client_error() {
            self.to_string()
        } else {
            "internal server error".to_owned()
        }
    }

    /// Short label used for metrics and log fields.
    pub fn category(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "session_not_found",
            Self::SessionFull(_) => "session_full",
            Self::NotBound => "not_bound",
            Self::NotYourTurn => "not_your_turn",
            Self::InvalidMove(_) => "invalid_move",
            Self::GameAlreadyOver => "game_already_over",
            Self::InvalidMessage(_) => "invalid_message",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::PersistenceFailed(_) => "persistence_failed",
            Self::Oracle(_) => "oracle",
            Self::Internal(_) => "internal",
        }
    }
}
