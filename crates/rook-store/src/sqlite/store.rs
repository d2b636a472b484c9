//! Pool-backed [`SessionStore`] implementation.

use rook_core::SessionId;
use tracing::{debug, instrument};

use crate::errors::Result;
use crate::record::{RecordUpdate, SessionRecord, SessionStore};
use crate::sqlite::connection::{ConnectionPool, PooledConnection};
use crate::sqlite::repositories::GameSessionRepo;

/// `SQLite` session store. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: ConnectionPool,
}

impl SqliteSessionStore {
    /// Wrap a pool whose schema has already been migrated.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }
}

impl SessionStore for SqliteSessionStore {
    #[instrument(skip_all, fields(session_id = %record.id))]
    fn create(&self, record: &SessionRecord) -> Result<()> {
        let conn = self.conn()?;
        GameSessionRepo::insert(&conn, record)?;
        debug!("session record created");
        Ok(())
    }

    fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        let conn = self.conn()?;
        GameSessionRepo::get(&conn, id.as_str())
    }

    #[instrument(skip_all, fields(session_id = %id))]
    fn update(&self, id: &SessionId, update: &RecordUpdate) -> Result<()> {
        let conn = self.conn()?;
        GameSessionRepo::update(&conn, id.as_str(), update)?;
        debug!(
            state = update.state.is_some(),
            moves = update.moves.as_ref().map(Vec::len),
            status = ?update.status,
            "session record updated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::connection::{ConnectionConfig, new_file, new_in_memory};
    use crate::sqlite::migrations::run_migrations;
    use rook_core::{GameState, SessionStatus};

    fn memory_store() -> SqliteSessionStore {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        let _ = run_migrations(&pool.get().unwrap()).unwrap();
        SqliteSessionStore::new(pool)
    }

    #[test]
    fn create_get_update_through_trait() {
        let store = memory_store();
        let store: &dyn SessionStore = &store;
        let id = SessionId::from("s1");
        store
            .create(&SessionRecord::new(id.clone(), GameState::new("start")))
            .unwrap();
        store
            .update(
                &id,
                &RecordUpdate {
                    status: Some(SessionStatus::InProgress),
                    ..RecordUpdate::default()
                },
            )
            .unwrap();
        let got = store.get(&id).unwrap().unwrap();
        assert_eq!(got.status, SessionStatus::InProgress);
    }

    #[test]
    fn every_operation_goes_through_a_pooled_connection() {
        let store = memory_store();
        let id = SessionId::from("pooled");
        store
            .create(&SessionRecord::new(id.clone(), GameState::new("start")))
            .unwrap();
        assert!(store.get(&id).unwrap().is_some());
        store.update(&id, &RecordUpdate::default()).unwrap();
        assert!(store.get(&SessionId::from("absent")).unwrap().is_none());
    }

    #[test]
    fn records_survive_reopening_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rook.db");
        let path = path.to_str().unwrap();
        let id = SessionId::from("durable");

        {
            let pool = new_file(path, &ConnectionConfig::default()).unwrap();
            let _ = run_migrations(&pool.get().unwrap()).unwrap();
            let store = SqliteSessionStore::new(pool);
            store
                .create(&SessionRecord::new(id.clone(), GameState::new("start")))
                .unwrap();
            store
                .update(
                    &id,
                    &RecordUpdate {
                        moves: Some(vec!["e4".into(), "e5".into()]),
                        ..RecordUpdate::default()
                    },
                )
                .unwrap();
        }

        let pool = new_file(path, &ConnectionConfig::default()).unwrap();
        let _ = run_migrations(&pool.get().unwrap()).unwrap();
        let store = SqliteSessionStore::new(pool);
        let got = store.get(&id).unwrap().unwrap();
        assert_eq!(got.moves, vec!["e4".to_owned(), "e5".to_owned()]);
        assert_eq!(got.status, SessionStatus::WaitingForOpponent);
    }
}
