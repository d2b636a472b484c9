//! In-process session store.

use std::collections::HashMap;

use parking_lot::Mutex;
use rook_core::SessionId;

use crate::errors::{Result, StoreError};
use crate::record::{RecordUpdate, SessionRecord, SessionStore};

/// `HashMap`-backed store. Records live as long as the process.
#[derive(Default)]
pub struct MemorySessionStore {
    records: Mutex<HashMap<SessionId, SessionRecord>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn create(&self, record: &SessionRecord) -> Result<()> {
        let mut records = self.records.lock();
        if records.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id.to_string()));
        }
        let _ = records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        Ok(self.records.lock().get(id).cloned())
    }

    fn update(&self, id: &SessionId, update: &RecordUpdate) -> Result<()> {
        let mut records = self.records.lock();
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.apply(update);
        Ok(())
    }
}
