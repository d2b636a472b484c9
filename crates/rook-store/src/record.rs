//! Persisted session record and the store contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rook_core::{GameResult, GameState, SessionId, SessionStatus};

use crate::errors::Result;

/// Durable copy of a session. The in-memory session is a cache of this.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Session identity.
    pub id: SessionId,
    /// Serialized oracle state.
    pub state: GameState,
    /// Append-only move log in canonical notation.
    pub moves: Vec<String>,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Terminal result, unset while the game runs.
    pub result: Option<GameResult>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Fresh record for a newly created session.
    pub fn new(id: SessionId, state: GameState) -> Self {
        let now = Utc::now();
        Self {
            id,
            state,
            moves: Vec::new(),
            status: SessionStatus::WaitingForOpponent,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update in place, stamping `updated_at`.
    pub fn apply(&mut self, update: &RecordUpdate) {
        if let Some(state) = &update.state {
            self.state = state.clone();
        }
        if let Some(moves) = &update.moves {
            self.moves.clone_from(moves);
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(result) = update.result {
            self.result = Some(result);
        }
        self.updated_at = Utc::now();
    }
}

/// Partial update. `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordUpdate {
    /// New serialized state.
    pub state: Option<GameState>,
    /// Full replacement move log.
    pub moves: Option<Vec<String>>,
    /// New status.
    pub status: Option<SessionStatus>,
    /// Terminal result.
    pub result: Option<GameResult>,
}

impl RecordUpdate {
    /// Whether the update carries no fields.
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.moves.is_none() && self.status.is_none() && self.result.is_none()
    }
}

/// Durable store of session records. Each call is atomic.
pub trait SessionStore: Send + Sync {
    /// Insert a new record. Fails with `AlreadyExists` on duplicate identity.
    fn create(&self, record: &SessionRecord) -> Result<()>;

    /// Point lookup. `Ok(None)` when absent.
    fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>>;

    /// Apply a partial update. Fails with `NotFound` when absent.
    fn update(&self, id: &SessionId, update: &RecordUpdate) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rook_core::Role;

    #[test]
    fn new_record_waits_for_opponent() {
        let record = SessionRecord::new(SessionId::from("s1"), GameState::new("start"));
        assert_eq!(record.status, SessionStatus::WaitingForOpponent);
        assert!(record.moves.is_empty());
        assert!(record.result.is_none());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn apply_touches_only_present_fields() {
        let mut record = SessionRecord::new(SessionId::from("s1"), GameState::new("start"));
        record.apply(&RecordUpdate {
            status: Some(SessionStatus::InProgress),
            ..RecordUpdate::default()
        });
        assert_eq!(record.state.as_str(), "start");
        assert_eq!(record.status, SessionStatus::InProgress);

        record.apply(&RecordUpdate {
            state: Some(GameState::new("after")),
            moves: Some(vec!["e4".into()]),
            status: Some(SessionStatus::Completed),
            result: Some(GameResult::Win { winner: Role::A }),
        });
        assert_eq!(record.state.as_str(), "after");
        assert_eq!(record.moves, vec!["e4".to_owned()]);
        assert_eq!(record.result, Some(GameResult::Win { winner: Role::A }));
        assert!(record.updated_at >= record.created_at);
    }

    #[test]
    fn empty_update() {
        assert!(RecordUpdate::default().is_empty());
        let update = RecordUpdate {
            moves: Some(Vec::new()),
            ..RecordUpdate::default()
        };
        assert!(!update.is_empty());
    }
}
