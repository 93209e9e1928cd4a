//! SQLite storage bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections for every context.
//! - Apply schema migrations in deterministic order.
//! - Drop and recreate managed tables for bootstrap/test databases.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Every handed-out connection has `foreign_keys=ON` and a busy timeout.
//! - Databases run in WAL mode; memory databases live in a private
//!   temporary directory owned by the handle.
//! - Core code must not read/write application data before migrations succeed.

use thiserror::Error;

pub mod migrations;
mod open;

pub use open::{Database, DEFAULT_BUSY_TIMEOUT_MS};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to prepare database storage: {0}")]
    Io(#[from] std::io::Error),
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}
