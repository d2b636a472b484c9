//! Serialized move application.
//!
//! Every move on a session runs entirely under that session's token:
//! validation, the oracle call, the in-memory update, write-through, and the
//! broadcast. The next waiter observes the result of the previous holder.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, info, instrument, warn};

use rook_core::{
    ConnectionId, GameError, GameResult, MoveInput, MoveVerdict, Role, SessionId, SessionStatus,
};

use crate::binding::ConnectionBinding;
use crate::registry::SessionRegistry;
use crate::router::{BroadcastRouter, MoveOutcome};
use crate::session::SessionState;

/// Applies moves one at a time per session.
pub struct MoveCoordinator {
    registry: Arc<SessionRegistry>,
    binding: Arc<ConnectionBinding>,
    router: BroadcastRouter,
}

impl MoveCoordinator {
    /// Wire the coordinator to its collaborators.
    pub fn new(
        registry: Arc<SessionRegistry>,
        binding: Arc<ConnectionBinding>,
        router: BroadcastRouter,
    ) -> Self {
        Self {
            registry,
            binding,
            router,
        }
    }

    /// Submit a move on behalf of a connection.
    ///
    /// On success the move has been applied, written through, and broadcast
    /// to the session's room before this returns. Rejections leave the
    /// session untouched.
    #[instrument(skip_all, fields(connection_id = %connection_id, input = %input))]
    pub async fn submit_move(
        &self,
        connection_id: &ConnectionId,
        input: &MoveInput,
    ) -> Result<MoveOutcome, GameError> {
        let started = Instant::now();
        let result = self.serialize(connection_id, input).await;
        match &result {
            Ok(outcome) => {
                counter!("moves_applied_total").increment(1);
                histogram!("move_apply_duration_seconds").record(started.elapsed().as_secs_f64());
                debug!(
                    session_id = %outcome.session_id,
                    move_number = outcome.move_number,
                    last_move = %outcome.last_move,
                    "move applied"
                );
            }
            Err(e) => {
                counter!("moves_rejected_total", "reason" => e.category()).increment(1);
                if e.is_client_error() {
                    debug!(code = e.code(), error = %e, "move rejected");
                } else {
                    warn!(error = %e, "move failed");
                }
            }
        }
        result
    }

    async fn serialize(
        &self,
        connection_id: &ConnectionId,
        input: &MoveInput,
    ) -> Result<MoveOutcome, GameError> {
        let (session_id, role) = self
            .binding
            .resolve(connection_id)
            .ok_or(GameError::NotBound)?;

        loop {
            let session = self.registry.lookup_session(&session_id)?;
            let mut state = session.acquire().await;
            if state.retired {
                // Evicted while we waited; the registry reloads from the store.
                continue;
            }

            // The binding may have changed while we were queued on the token.
            match self.binding.resolve(connection_id) {
                Some((current, r)) if current == session_id && r == role => {}
                _ => return Err(GameError::NotBound),
            }

            session.touch();
            return self.apply_locked(&session_id, &mut state, role, input);
        }
    }

    fn apply_locked(
        &self,
        session_id: &SessionId,
        state: &mut SessionState,
        role: Role,
        input: &MoveInput,
    ) -> Result<MoveOutcome, GameError> {
        let oracle = self.registry.oracle();

        if state.unpersisted {
            self.recover(session_id, state)?;
        }

        match state.status {
            SessionStatus::Completed => return Err(GameError::GameAlreadyOver),
            SessionStatus::WaitingForOpponent => return Err(GameError::NotYourTurn),
            SessionStatus::InProgress => {}
        }
        if oracle.turn_of(&state.game_state)? != role {
            return Err(GameError::NotYourTurn);
        }

        let applied = match oracle.apply_move(&state.game_state, input)? {
            MoveVerdict::Legal(applied) => applied,
            MoveVerdict::Illegal { reason } => return Err(GameError::InvalidMove(reason)),
        };
        // Judge the new state before touching memory so an oracle fault
        // leaves the session at its last good state.
        let terminal = oracle.terminal_result(&applied.state)?;
        let turn = oracle.turn_of(&applied.state)?;

        let last_move = applied.notation.clone();
        state.game_state = applied.state;
        state.moves.push(applied.notation);
        let result = terminal.into_result();
        if let Some(result) = result {
            state.status = SessionStatus::Completed;
            state.result = Some(result);
        }

        let outcome = MoveOutcome {
            session_id: session_id.clone(),
            state: state.game_state.clone(),
            last_move,
            turn,
            move_number: state.moves.len(),
            result,
        };

        if let Err(e) = self.write_through(session_id, state, result) {
            state.unpersisted = true;
            state.unannounced = true;
            return Err(e);
        }

        if let Some(result) = result {
            info!(session_id = %session_id, %result, "game over");
        }
        self.router.move_applied(&outcome);
        Ok(outcome)
    }

    fn write_through(
        &self,
        session_id: &SessionId,
        state: &SessionState,
        result: Option<GameResult>,
    ) -> Result<(), GameError> {
        let reconciler = self.registry.reconciler();
        // The whole log is rewritten so a retried write never duplicates entries.
        reconciler.persist_move(session_id, &state.game_state, &state.moves)?;
        if let Some(result) = result {
            reconciler.persist_result(session_id, result)?;
        }
        Ok(())
    }

    /// Re-write a session whose last write-through failed.
    ///
    /// Returns `Ok(false)` when nothing was pending.
    pub async fn retry_persist(&self, session_id: &SessionId) -> Result<bool, GameError> {
        let Some(session) = self.registry.get_cached(session_id) else {
            return Ok(false);
        };
        let mut state = session.acquire().await;
        if state.retired || !state.unpersisted {
            return Ok(false);
        }
        self.recover(session_id, &mut state)?;
        Ok(true)
    }

    fn recover(&self, session_id: &SessionId, state: &mut SessionState) -> Result<(), GameError> {
        self.registry.reconciler().flush(session_id, state)?;
        state.unpersisted = false;
        info!(session_id = %session_id, "pending write-through recovered");

        if state.unannounced {
            state.unannounced = false;
            if let Some(last_move) = state.moves.last() {
                let outcome = MoveOutcome {
                    session_id: session_id.clone(),
                    state: state.game_state.clone(),
                    last_move: last_move.clone(),
                    turn: self.registry.oracle().turn_of(&state.game_state)?,
                    move_number: state.moves.len(),
                    result: state.result,
                };
                self.router.move_applied(&outcome);
            }
        }
        Ok(())
    }
}
