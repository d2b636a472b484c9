//! Cache-aside loads and write-through persistence.
//!
//! The reconciler is the only component that talks to the store. Every
//! store failure is translated into a [`GameError`] here so callers never see
//! backend-specific errors.

use std::sync::Arc;

use metrics::counter;
use tracing::{error, warn};

use rook_core::{GameError, GameResult, GameState, SessionId, SessionStatus};
use rook_store::{RecordUpdate, SessionRecord, SessionStore, StoreError};

use crate::session::SessionState;

/// Bridges live sessions and the durable store.
pub struct StateReconciler {
    store: Arc<dyn SessionStore>,
}

impl StateReconciler {
    /// Wrap a store.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Persist a brand-new session.
    pub fn create(&self, record: &SessionRecord) -> Result<(), GameError> {
        self.store.create(record).map_err(|e| {
            error!(session_id = %record.id, error = %e, "failed to create session record");
            GameError::StoreUnavailable(e.to_string())
        })
    }

    /// Cache-miss load.
    pub fn load(&self, id: &SessionId) -> Result<SessionRecord, GameError> {
        match self.store.get(id) {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(GameError::SessionNotFound(id.to_string())),
            Err(e) => {
                error!(session_id = %id, error = %e, "failed to load session record");
                Err(GameError::StoreUnavailable(e.to_string()))
            }
        }
    }

    /// Write-through of an accepted move: new state plus the full move log.
    pub fn persist_move(
        &self,
        id: &SessionId,
        state: &GameState,
        moves: &[String],
    ) -> Result<(), GameError> {
        self.write(
            id,
            &RecordUpdate {
                state: Some(state.clone()),
                moves: Some(moves.to_vec()),
                ..RecordUpdate::default()
            },
        )
    }

    /// Write-through of a terminal result.
    pub fn persist_result(&self, id: &SessionId, result: GameResult) -> Result<(), GameError> {
        self.write(
            id,
            &RecordUpdate {
                status: Some(SessionStatus::Completed),
                result: Some(result),
                ..RecordUpdate::default()
            },
        )
    }

    /// Write-through of a status transition.
    pub fn persist_status(&self, id: &SessionId, status: SessionStatus) -> Result<(), GameError> {
        self.write(
            id,
            &RecordUpdate {
                status: Some(status),
                ..RecordUpdate::default()
            },
        )
    }

    /// Re-write the whole in-memory snapshot after an earlier failure.
    pub fn flush(&self, id: &SessionId, state: &SessionState) -> Result<(), GameError> {
        self.write(id, &state.snapshot())
    }

    fn write(&self, id: &SessionId, update: &RecordUpdate) -> Result<(), GameError> {
        self.store.update(id, update).map_err(|e| {
            counter!("persistence_failures_total").increment(1);
            match e {
                StoreError::NotFound(_) => {
                    error!(session_id = %id, "session record vanished from store");
                }
                ref other => warn!(session_id = %id, error = %other, "write-through failed"),
            }
            GameError::PersistenceFailed(e.to_string())
        })
    }
}
