//! In-memory session registry.
//!
//! Sessions are cached in a `DashMap`; map shards are only locked for the
//! duration of a lookup or insert. Game state is never touched under a map
//! lock, only under each session's own token.

use std::sync::Arc;

use dashmap::DashMap;
use metrics::{counter, gauge};
use tracing::{debug, info, instrument, warn};

use rook_core::{GameError, MoveOracle, SessionId};
use rook_store::SessionRecord;

use crate::reconciler::StateReconciler;
use crate::session::Session;

/// Owns every live [`Session`].
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
    reconciler: Arc<StateReconciler>,
    oracle: Arc<dyn MoveOracle>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new(reconciler: Arc<StateReconciler>, oracle: Arc<dyn MoveOracle>) -> Self {
        Self {
            sessions: DashMap::new(),
            reconciler,
            oracle,
        }
    }

    /// Allocate a session with a fresh game, persist it, then register it.
    ///
    /// Nothing is registered if the store rejects the record.
    #[instrument(skip(self))]
    pub fn create_session(&self) -> Result<Arc<Session>, GameError> {
        let record = SessionRecord::new(SessionId::new(), self.oracle.new_game());
        self.reconciler.create(&record)?;

        let id = record.id.clone();
        let session = Arc::new(Session::from_record(record));
        let _ = self.sessions.insert(id.clone(), session.clone());

        counter!("sessions_created_total").increment(1);
        self.record_active();
        info!(session_id = %id, "session created");
        Ok(session)
    }

    /// Memory first, then the store.
    ///
    /// Concurrent cold loads of the same identity race on the map entry; the
    /// first insert wins and every caller receives that same `Session`.
    pub fn lookup_session(&self, id: &SessionId) -> Result<Arc<Session>, GameError> {
        if let Some(existing) = self.sessions.get(id) {
            return Ok(existing.clone());
        }

        let record = self.reconciler.load(id)?;
        let session = self
            .sessions
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(session_id = %id, "session loaded from store");
                Arc::new(Session::from_record(record))
            })
            .clone();
        self.record_active();
        Ok(session)
    }

    /// Cached session without falling back to the store.
    pub fn get_cached(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|s| s.clone())
    }

    /// Evict a session from memory. The stored record is kept.
    ///
    /// Waits for the session's token, so an in-flight move finishes first.
    /// A session whose last write-through failed is flushed before eviction;
    /// if the flush fails again it stays cached and `false` is returned.
    pub async fn retire_session(&self, id: &SessionId) -> bool {
        self.retire_session_if(id, |_| true).await
    }

    /// Evict a session only if `should_retire` still holds once the token is held.
    #[instrument(skip(self, should_retire))]
    pub async fn retire_session_if<F>(&self, id: &SessionId, should_retire: F) -> bool
    where
        F: FnOnce(&Session) -> bool,
    {
        let Some(session) = self.get_cached(id) else {
            return false;
        };

        let mut state = session.acquire().await;
        if state.retired || !should_retire(&session) {
            return false;
        }
        if state.unpersisted {
            if let Err(e) = self.reconciler.flush(id, &state) {
                warn!(error = %e, "keeping unpersisted session in memory");
                return false;
            }
            state.unpersisted = false;
        }

        state.retired = true;
        let _ = self
            .sessions
            .remove_if(id, |_, cached| Arc::ptr_eq(cached, &session));
        drop(state);

        counter!("sessions_retired_total").increment(1);
        self.record_active();
        info!("session retired");
        true
    }

    /// Number of sessions cached in memory.
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_active(&self) {
        gauge!("sessions_active").set(self.active_count() as f64);
    }

    /// Identities of every cached session.
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    /// The oracle sessions are created with.
    pub fn oracle(&self) -> &Arc<dyn MoveOracle> {
        &self.oracle
    }

    /// The reconciler backing cold loads.
    pub fn reconciler(&self) -> &Arc<StateReconciler> {
        &self.reconciler
    }
}
