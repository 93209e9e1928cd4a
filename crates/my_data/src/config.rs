//! Explicit configuration for a `MyData` handle.
//!
//! # Responsibility
//! - Describe which database to open and how.
//! - Carry the service-user credentials used for token and credential lookups.
//!
//! # Invariants
//! - Configuration is a plain value; nothing here is process-global.
//! - `sqlite_file` requires `db_filename`.

use crate::db::DEFAULT_BUSY_TIMEOUT_MS;
use crate::error::{DataError, DataResult};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseType {
    /// Process-local database, dropped with the handle. Used for tests.
    SqliteMemory,
    /// Database file on disk.
    SqliteFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub db_type: DatabaseType,
    #[serde(default)]
    pub db_filename: Option<PathBuf>,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Username/password of a `service` role account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCredentials {
    pub username: String,
    pub password: String,
}

impl ServiceCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Debug for ServiceCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Top-level configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyDataConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub service_user: Option<ServiceCredentials>,
}

impl MyDataConfig {
    /// In-memory database without service credentials.
    pub fn memory() -> Self {
        Self {
            database: DatabaseConfig {
                db_type: DatabaseType::SqliteMemory,
                db_filename: None,
                busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            },
            service_user: None,
        }
    }

    /// File database without service credentials.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            database: DatabaseConfig {
                db_type: DatabaseType::SqliteFile,
                db_filename: Some(path.as_ref().to_path_buf()),
                busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            },
            service_user: None,
        }
    }

    pub fn with_service_user(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.service_user = Some(ServiceCredentials::new(username, password));
        self
    }

    pub fn from_json_str(raw: &str) -> DataResult<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|err| DataError::Config(format!("invalid configuration json: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> DataResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            DataError::Config(format!(
                "failed to read configuration `{}`: {err}",
                path.display()
            ))
        })?;
        Self::from_json_str(&raw)
    }

    /// Checks cross-field rules serde cannot express.
    pub fn validate(&self) -> DataResult<()> {
        if self.database.db_type == DatabaseType::SqliteFile
            && self
                .database
                .db_filename
                .as_ref()
                .map_or(true, |path| path.as_os_str().is_empty())
        {
            return Err(DataError::Config(
                "sqlite_file database requires `db_filename`".to_string(),
            ));
        }
        if let Some(service) = &self.service_user {
            if service.username.trim().is_empty() {
                return Err(DataError::Config(
                    "service_user.username must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
