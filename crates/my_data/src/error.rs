//! Error taxonomy shared by every layer above raw storage.
//!
//! # Invariants
//! - Errors are returned to the caller immediately; nothing here retries.
//! - SQLite constraint violations surface as `Validation`, never as `Db`.

use crate::db::DbError;
use rusqlite::ErrorCode;
use thiserror::Error;

pub type DataResult<T> = Result<T, DataError>;

#[derive(Debug, Error)]
pub enum DataError {
    /// Credential assertion rejected. The reason is logged, not returned.
    #[error("authentication failed")]
    Authentication,
    /// Token policy rejected the presented token.
    #[error("authorization failed: {0}")]
    Authorization(String),
    /// Role or ownership mismatch inside a context.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// Entity violates a model or storage constraint.
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{resource} not found: {key}")]
    NotFound { resource: &'static str, key: String },
    /// Relation read outside of the context that could have loaded it.
    #[error("relation `{0}` is not loaded; call load_relations inside an open context")]
    DetachedEntity(&'static str),
    #[error("data load failed: {0}")]
    DataLoad(String),
    #[error("failed to create api token: {0}")]
    TokenCreation(#[source] Box<DataError>),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("credential error: {0}")]
    Credential(String),
    /// Persisted row cannot be mapped back to a model.
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    #[error(transparent)]
    Db(#[from] DbError),
}

impl DataError {
    pub(crate) fn not_found(resource: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            resource,
            key: key.to_string(),
        }
    }

    /// Short stable code used in log records.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication_failed",
            Self::Authorization(_) => "authorization_failed",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Validation(_) => "validation_failed",
            Self::NotFound { .. } => "not_found",
            Self::DetachedEntity(_) => "detached_entity",
            Self::DataLoad(_) => "data_load_failed",
            Self::TokenCreation(_) => "token_creation_failed",
            Self::Config(_) => "config_invalid",
            Self::Credential(_) => "credential_error",
            Self::InvalidData(_) => "invalid_data",
            Self::Db(_) => "db_error",
        }
    }
}

impl From<rusqlite::Error> for DataError {
    fn from(value: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(err, message) = &value {
            if err.code == ErrorCode::ConstraintViolation {
                return Self::Validation(
                    message
                        .clone()
                        .unwrap_or_else(|| "constraint violation".to_string()),
                );
            }
        }
        Self::Db(DbError::Sqlite(value))
    }
}
