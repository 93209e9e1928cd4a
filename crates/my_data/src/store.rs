//! Top-level handle tying configuration, storage and contexts together.
//!
//! # Responsibility
//! - Open the configured database once.
//! - Hand out service and user contexts.
//! - Bootstrap tables and the built-in initial data set.
//!
//! # Invariants
//! - No process-global state: two handles never share data unless they
//!   point at the same database file.

use crate::config::{MyDataConfig, ServiceCredentials};
use crate::context::{ServiceContext, UserContext};
use crate::db::Database;
use crate::error::{DataError, DataResult};
use crate::loader::{DataLoader, InitialDataSource, LoadSummary};
use crate::model::user::User;
use log::{info, warn};

#[derive(Debug)]
pub struct MyData {
    database: Database,
    service_user: Option<ServiceCredentials>,
}

impl MyData {
    /// Validates `config`, opens the database and applies migrations.
    pub fn new(config: &MyDataConfig) -> DataResult<Self> {
        config.validate()?;
        let database = Database::from_config(&config.database)?;
        info!(
            "event=my_data_open module=store status=ok mode={} service_user={}",
            database.mode(),
            config.service_user.is_some()
        );
        Ok(Self {
            database,
            service_user: config.service_user.clone(),
        })
    }

    /// Empty in-memory store without service credentials.
    pub fn in_memory() -> DataResult<Self> {
        Self::new(&MyDataConfig::memory())
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Applies migrations, dropping every managed table first when asked.
    pub fn create_tables(&self, drop_tables: bool) -> DataResult<()> {
        self.database.create_tables(drop_tables)?;
        info!("event=create_tables module=store status=ok drop_tables={drop_tables}");
        Ok(())
    }

    /// Recreates all tables and loads the built-in initial data set.
    pub fn create_init_data(&self) -> DataResult<LoadSummary> {
        self.create_tables(true)?;
        DataLoader::new(InitialDataSource).load(self)
    }

    /// Opens a context for `user`.
    pub fn user_context(&self, user: &User) -> DataResult<UserContext> {
        UserContext::open(&self.database, user)
    }

    /// Opens a service context with the configured service credentials.
    ///
    /// # Errors
    /// - `Config` when no service user is configured.
    pub fn service_context(&self) -> DataResult<ServiceContext> {
        let credentials = self.service_user.as_ref().ok_or_else(|| {
            DataError::Config("no service_user configured".to_string())
        })?;
        ServiceContext::open(&self.database, &credentials.username, &credentials.password)
    }

    /// Opens a service context with explicit credentials.
    pub fn service_context_with(&self, username: &str, password: &str) -> DataResult<ServiceContext> {
        ServiceContext::open(&self.database, username, password)
    }

    /// Runs `f` in a user context; commits on `Ok`, rolls back on `Err`.
    pub fn with_user_context<T>(
        &self,
        user: &User,
        f: impl FnOnce(&UserContext) -> DataResult<T>,
    ) -> DataResult<T> {
        let context = self.user_context(user)?;
        match f(&context) {
            Ok(value) => {
                context.commit()?;
                Ok(value)
            }
            Err(err) => {
                warn!(
                    "event=context_scope module=store status=error kind=user error_code={} error={err}",
                    err.code()
                );
                rollback_quietly(context.rollback());
                Err(err)
            }
        }
    }

    /// Runs `f` in the configured service context and closes it afterwards.
    pub fn with_service_context<T>(
        &self,
        f: impl FnOnce(&ServiceContext) -> DataResult<T>,
    ) -> DataResult<T> {
        let context = self.service_context()?;
        match f(&context) {
            Ok(value) => {
                context.commit()?;
                Ok(value)
            }
            Err(err) => {
                rollback_quietly(context.rollback());
                Err(err)
            }
        }
    }
}

// A failed rollback is logged; the caller gets the closure's error.
fn rollback_quietly(result: DataResult<()>) {
    if let Err(err) = result {
        warn!(
            "event=context_rollback module=store status=error error_code={} error={err}",
            err.code()
        );
    }
}
