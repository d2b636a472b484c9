//! Live session object and its serialization token.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{Mutex as TokenMutex, MutexGuard};

use rook_core::{GameResult, GameState, SessionId, SessionStatus};
use rook_store::{RecordUpdate, SessionRecord};

/// Mutable half of a session. Only reachable through [`Session::acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Current oracle state.
    pub game_state: GameState,
    /// Append-only move log.
    pub moves: Vec<String>,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Terminal result once completed.
    pub result: Option<GameResult>,
    /// In-memory state is ahead of the store.
    pub unpersisted: bool,
    /// The last applied move has not been broadcast yet.
    pub unannounced: bool,
    /// Evicted from the registry. Holders must re-resolve the session.
    pub retired: bool,
}

impl SessionState {
    /// Full snapshot of every persisted field, used to re-sync the store.
    pub fn snapshot(&self) -> RecordUpdate {
        RecordUpdate {
            state: Some(self.game_state.clone()),
            moves: Some(self.moves.clone()),
            status: Some(self.status),
            result: self.result,
        }
    }
}

/// A live game session cached in memory.
///
/// The session's token is a `tokio` mutex created with the session and
/// dropped with it. Holding the guard is the only way to read or mutate game
/// state, so at most one operation is ever in flight per session.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    created_at: DateTime<Utc>,
    last_activity: Mutex<Instant>,
    token: TokenMutex<SessionState>,
}

impl Session {
    /// Rebuild a live session from its durable record.
    pub fn from_record(record: SessionRecord) -> Self {
        Self {
            id: record.id,
            created_at: record.created_at,
            last_activity: Mutex::new(Instant::now()),
            token: TokenMutex::new(SessionState {
                game_state: record.state,
                moves: record.moves,
                status: record.status,
                result: record.result,
                unpersisted: false,
                unannounced: false,
                retired: false,
            }),
        }
    }

    /// Session identity.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// When the session was first created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Wait for the token. There is no timeout; waiters are served in FIFO order.
    pub async fn acquire(&self) -> MutexGuard<'_, SessionState> {
        self.token.lock().await
    }

    /// Take the token only if nobody holds it.
    pub fn try_acquire(&self) -> Option<MutexGuard<'_, SessionState>> {
        self.token.try_lock().ok()
    }

    /// Record activity now.
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Time since the last recorded activity.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }
}
