//! Context for service accounts.
//!
//! # Responsibility
//! - Resolve users and tokens for authentication and authorization.
//!
//! # Invariants
//! - Only an enabled `service` account with a matching password opens one.
//! - Lookups are read-only and ignore row ownership.

use super::session::Session;
use super::Principal;
use crate::credentials;
use crate::db::Database;
use crate::error::{DataError, DataResult};
use crate::model::api::{ApiClient, ApiClientId, ApiScope, ApiToken};
use crate::model::user::{User, UserId, UserRole};
use crate::repo::api_repo::{find_by_token, list_scopes};
use crate::repo::user_repo::find_by_username;
use crate::repo::{find_by_id, Resource};
use log::{info, warn};

/// Read-only transaction bound to a service account.
#[derive(Debug)]
pub struct ServiceContext {
    session: Session,
    principal: Principal,
}

impl ServiceContext {
    /// Opens a context after checking the service account's credentials.
    ///
    /// # Errors
    /// - `PermissionDenied` for unknown, non-service, disabled accounts and
    ///   wrong passwords. The log record carries the reason.
    pub(crate) fn open(database: &Database, username: &str, password: &str) -> DataResult<Self> {
        let session = Session::begin(database.connect()?)?;
        let candidate = find_by_username(session.conn(), username)?;

        let reason = match &candidate {
            None => Some("unknown_user"),
            Some(user) if user.role != UserRole::Service => Some("not_service"),
            Some(user) if !user.enabled => Some("disabled"),
            Some(user) => match user.password_hash.as_deref() {
                Some(hash) if credentials::verify_password(password, hash) => None,
                _ => Some("bad_password"),
            },
        };

        match (candidate, reason) {
            (Some(user), None) => {
                let principal = Principal::from_user(&user)?;
                info!(
                    "event=context_open module=context status=ok kind=service user_id={}",
                    principal.id
                );
                Ok(Self { session, principal })
            }
            (_, reason) => {
                warn!(
                    "event=context_open module=context status=denied kind=service reason={}",
                    reason.unwrap_or("unknown")
                );
                Err(DataError::PermissionDenied(format!(
                    "`{username}` is not a valid service account"
                )))
            }
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn user_by_username(&self, username: &str) -> DataResult<User> {
        find_by_username(self.session.conn(), username)?
            .ok_or_else(|| DataError::not_found("user", username))
    }

    pub fn user_by_id(&self, id: UserId) -> DataResult<User> {
        find_by_id::<User>(self.session.conn(), id)?.ok_or_else(|| DataError::not_found("user", id))
    }

    /// Owner of the token string `token`.
    pub fn user_by_api_token(&self, token: &str) -> DataResult<User> {
        let api_token = self.find_token(token)?;
        let owner = api_token
            .user_id
            .ok_or_else(|| DataError::InvalidData("api token without owner".to_string()))?;
        self.user_by_id(owner)
    }

    /// Token record for `token`, with its scopes loaded.
    pub fn api_token(&self, token: &str) -> DataResult<ApiToken> {
        let mut api_token = self.find_token(token)?;
        api_token.load_relations(self.session.conn())?;
        Ok(api_token)
    }

    pub fn api_client(&self, id: ApiClientId) -> DataResult<ApiClient> {
        find_by_id::<ApiClient>(self.session.conn(), id)?
            .ok_or_else(|| DataError::not_found("api_client", id))
    }

    pub fn api_scopes(&self) -> DataResult<Vec<ApiScope>> {
        list_scopes(self.session.conn())
    }

    pub fn commit(self) -> DataResult<()> {
        self.session.commit()
    }

    pub fn rollback(self) -> DataResult<()> {
        self.session.rollback()
    }

    fn find_token(&self, token: &str) -> DataResult<ApiToken> {
        // The token string is a credential; keep it out of the error.
        find_by_token(self.session.conn(), token)?
            .ok_or_else(|| DataError::not_found("api_token", "<redacted>"))
    }
}
