//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Resolve a `DatabaseConfig` into a reusable `Database` handle.
//! - Hand out one fresh, configured connection per context.
//! - Trigger schema migrations once, when the handle is opened.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Databases run in WAL mode, so readers never wait for an open writer.
//! - A memory database lives as long as its `Database` handle; every
//!   connection from the same handle sees the same data.

use super::migrations::{apply_migrations, drop_managed_tables};
use super::DbResult;
use crate::config::{DatabaseConfig, DatabaseType};
use crate::error::{DataError, DataResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

const MEMORY_DB_FILENAME: &str = "my_data.sqlite";

#[derive(Debug)]
enum Target {
    // Scratch file in a private directory, removed with the handle.
    Memory { _dir: TempDir, path: PathBuf },
    File { path: PathBuf },
}

impl Target {
    fn mode(&self) -> &'static str {
        match self {
            Self::Memory { .. } => "memory",
            Self::File { .. } => "file",
        }
    }

    fn path(&self) -> &Path {
        match self {
            Self::Memory { path, .. } | Self::File { path } => path,
        }
    }
}

/// Opened SQLite database that contexts borrow connections from.
#[derive(Debug)]
pub struct Database {
    target: Target,
    busy_timeout: Duration,
}

impl Database {
    /// Opens the database described by `config` and applies pending migrations.
    ///
    /// # Errors
    /// - `DataError::Config` when a file database has no filename.
    /// - `DataError::Db` when opening or migrating fails.
    pub fn from_config(config: &DatabaseConfig) -> DataResult<Self> {
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        match config.db_type {
            DatabaseType::SqliteMemory => Ok(Self::open_memory(busy_timeout)?),
            DatabaseType::SqliteFile => {
                let path = config.db_filename.as_deref().ok_or_else(|| {
                    DataError::Config("sqlite_file database requires `db_filename`".to_string())
                })?;
                Ok(Self::open_file(path, busy_timeout)?)
            }
        }
    }

    /// Opens a private scratch database, deleted together with the handle.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::open_memory(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))
    }

    /// Opens (or creates) a database file.
    pub fn open_path(path: impl AsRef<Path>) -> DbResult<Self> {
        Self::open_file(
            path.as_ref(),
            Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        )
    }

    fn open_memory(busy_timeout: Duration) -> DbResult<Self> {
        let dir = tempfile::Builder::new().prefix("my_data_").tempdir()?;
        let path = dir.path().join(MEMORY_DB_FILENAME);
        let database = Self {
            target: Target::Memory { _dir: dir, path },
            busy_timeout,
        };
        database.bootstrap()?;
        Ok(database)
    }

    fn open_file(path: &Path, busy_timeout: Duration) -> DbResult<Self> {
        let database = Self {
            target: Target::File {
                path: path.to_path_buf(),
            },
            busy_timeout,
        };
        database.bootstrap()?;
        Ok(database)
    }

    fn bootstrap(&self) -> DbResult<()> {
        let started_at = Instant::now();
        let mode = self.target.mode();
        info!("event=db_open module=db status=start mode={mode}");

        let result = self.connect().and_then(|mut conn| {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
            apply_migrations(&mut conn)
        });

        match &result {
            Ok(_) => info!(
                "event=db_open module=db status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={err}",
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    /// Opens a new configured connection to this database.
    pub fn connect(&self) -> DbResult<Connection> {
        let conn = Connection::open(self.target.path())?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }

    /// Creates all tables, optionally dropping the managed tables first.
    pub fn create_tables(&self, drop_tables: bool) -> DbResult<()> {
        let mut conn = self.connect()?;
        if drop_tables {
            drop_managed_tables(&mut conn)?;
        }
        apply_migrations(&mut conn)
    }

    /// `memory` or `file`, for diagnostics.
    pub fn mode(&self) -> &'static str {
        self.target.mode()
    }
}

#[cfg(test)]
mod tests {
    use super::Database;

    #[test]
    fn memory_connections_share_data() {
        let database = Database::open_in_memory().unwrap();
        let first = database.connect().unwrap();
        first
            .execute(
                "INSERT INTO users (username, email, fullname, role) VALUES ('a', 'a@example.com', 'A', 'normal')",
                [],
            )
            .unwrap();

        let second = database.connect().unwrap();
        let count: i64 = second
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn separate_memory_databases_are_isolated() {
        let left = Database::open_in_memory().unwrap();
        let right = Database::open_in_memory().unwrap();
        left.connect()
            .unwrap()
            .execute(
                "INSERT INTO users (username, email, fullname, role) VALUES ('a', 'a@example.com', 'A', 'normal')",
                [],
            )
            .unwrap();

        let count: i64 = right
            .connect()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn memory_databases_use_wal() {
        let database = Database::open_in_memory().unwrap();
        let mode: String = database
            .connect()
            .unwrap()
            .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn connections_enforce_foreign_keys() {
        let database = Database::open_in_memory().unwrap();
        let conn = database.connect().unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
