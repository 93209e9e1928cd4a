//! Data access layer for My Data.
//! Every read and write goes through a context bound to an authenticated
//! principal; ownership rules live here, not in callers.

pub mod auth;
pub mod config;
pub mod context;
pub mod credentials;
pub mod db;
pub mod error;
pub mod loader;
pub mod logging;
pub mod model;
pub mod repo;
pub mod store;

pub use auth::{
    ApiTokenAuthorizer, AuthorizationPolicy, Authenticator, CredentialsAuthenticator,
    ResolvedToken, TokenPolicy, UserAuthenticator,
};
pub use config::{DatabaseConfig, DatabaseType, MyDataConfig, ServiceCredentials};
pub use context::{scope_filter, Principal, ResourceManager, ServiceContext, UserContext};
pub use error::{DataError, DataResult};
pub use loader::{
    DataLoader, DataSet, DataSource, InitialDataSource, JsonDataSource, LoadSummary,
    StaticDataSource, UserRecord,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::api::{ApiClient, ApiScope, ApiToken, ApiTokenScope};
pub use model::relation::Relation;
pub use model::tag::Tag;
pub use model::user::{User, UserId, UserRole};
pub use model::user_setting::UserSetting;
pub use repo::filter::{Filter, RetrieveQuery, Sort};
pub use repo::AccessRule;
pub use store::MyData;

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
