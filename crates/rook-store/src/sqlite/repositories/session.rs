//! Game session repository.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use rook_core::{GameResult, GameState, SessionId, SessionStatus};

use crate::errors::{Result, StoreError};
use crate::record::{RecordUpdate, SessionRecord};

/// Raw column values as read from `game_sessions`.
struct GameSessionRow {
    id: String,
    state: String,
    moves: String,
    status: String,
    result: Option<String>,
    created_at: String,
    updated_at: String,
}

impl GameSessionRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            state: row.get("state")?,
            moves: row.get("moves")?,
            status: row.get("status")?,
            result: row.get("result")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn into_record(self) -> Result<SessionRecord> {
        let corrupt = |message: String| StoreError::Corrupt {
            id: self.id.clone(),
            message,
        };
        let moves: Vec<String> = serde_json::from_str(&self.moves)
            .map_err(|e| corrupt(format!("moves: {e}")))?;
        let status: SessionStatus = self.status.parse().map_err(|e| corrupt(format!("{e}")))?;
        let result = self
            .result
            .as_deref()
            .map(str::parse::<GameResult>)
            .transpose()
            .map_err(|e| corrupt(format!("{e}")))?;
        let created_at = parse_timestamp(&self.created_at).map_err(&corrupt)?;
        let updated_at = parse_timestamp(&self.updated_at).map_err(&corrupt)?;
        Ok(SessionRecord {
            id: SessionId::from_string(self.id),
            state: GameState::new(self.state),
            moves,
            status,
            result,
            created_at,
            updated_at,
        })
    }
}

fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("timestamp {raw}: {e}"))
}

/// Game session repository. Stateless; every method takes `&Connection`.
pub struct GameSessionRepo;

impl GameSessionRepo {
    /// Insert a new record.
    pub fn insert(conn: &Connection, record: &SessionRecord) -> Result<()> {
        let moves = serde_json::to_string(&record.moves)?;
        let inserted = conn.execute(
            "INSERT INTO game_sessions (id, state, moves, status, result, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (id) DO NOTHING",
            params![
                record.id.as_str(),
                record.state.as_str(),
                moves,
                record.status.as_str(),
                record.result.map(GameResult::as_str),
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::AlreadyExists(record.id.to_string()));
        }
        Ok(())
    }

    /// Fetch a record by ID.
    pub fn get(conn: &Connection, id: &str) -> Result<Option<SessionRecord>> {
        let row = conn
            .query_row(
                "SELECT id, state, moves, status, result, created_at, updated_at
                 FROM game_sessions WHERE id = ?1",
                params![id],
                GameSessionRow::from_row,
            )
            .optional()?;
        row.map(GameSessionRow::into_record).transpose()
    }

    /// Apply a partial update; `updated_at` is always refreshed.
    pub fn update(conn: &Connection, id: &str, update: &RecordUpdate) -> Result<()> {
        let mut sets: Vec<&'static str> = Vec::with_capacity(5);
        let mut values: Vec<String> = Vec::with_capacity(6);

        if let Some(state) = &update.state {
            sets.push("state = ?");
            values.push(state.as_str().to_owned());
        }
        if let Some(moves) = &update.moves {
            sets.push("moves = ?");
            values.push(serde_json::to_string(moves)?);
        }
        if let Some(status) = update.status {
            sets.push("status = ?");
            values.push(status.as_str().to_owned());
        }
        if let Some(result) = update.result {
            sets.push("result = ?");
            values.push(result.as_str().to_owned());
        }
        sets.push("updated_at = ?");
        values.push(Utc::now().to_rfc3339());
        values.push(id.to_owned());

        let sql = format!("UPDATE game_sessions SET {} WHERE id = ?", sets.join(", "));
        let changed = conn.execute(&sql, params_from_iter(values.iter()))?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_owned()));
        }
        Ok(())
    }
}
