//! # rook-store
//!
//! Durable session records.
//!
//! - [`SessionStore`]: the create / point-lookup / partial-update contract
//! - [`SqliteSessionStore`]: `r2d2`-pooled `SQLite` backend with versioned migrations
//! - [`MemorySessionStore`]: process-local backend for tests and ephemeral runs

#![deny(unsafe_code)]

pub mod errors;
pub mod memory;
pub mod record;
pub mod sqlite;

pub use errors::{Result, StoreError};
pub use memory::MemorySessionStore;
pub use record::{RecordUpdate, SessionRecord, SessionStore};
pub use sqlite::connection::{ConnectionConfig, ConnectionPool, new_file, new_in_memory};
pub use sqlite::migrations::run_migrations;
pub use sqlite::store::SqliteSessionStore;
