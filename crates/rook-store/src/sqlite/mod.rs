//! `SQLite` backend: connection pool, schema migrations, and the repository
//! behind [`store::SqliteSessionStore`].

pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod store;
