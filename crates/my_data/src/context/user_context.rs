//! Context for root and normal users.

use super::manager::ResourceManager;
use super::session::Session;
use super::Principal;
use crate::db::Database;
use crate::error::{DataError, DataResult};
use crate::model::api::{ApiClient, ApiToken};
use crate::model::tag::Tag;
use crate::model::user::{User, UserRole};
use crate::model::user_setting::UserSetting;
use crate::repo::find_by_id;
use log::{info, warn};

/// Transaction bound to a root or normal user.
///
/// Dropping it without `commit` rolls back everything done through it.
#[derive(Debug)]
pub struct UserContext {
    session: Session,
    principal: Principal,
}

impl UserContext {
    /// Opens a context for `user`, re-reading its role and state from storage.
    ///
    /// # Errors
    /// - `PermissionDenied` for service, disabled or unsaved users.
    /// - `NotFound` when the user no longer exists.
    pub(crate) fn open(database: &Database, user: &User) -> DataResult<Self> {
        let claimed = Principal::from_user(user)?;
        let session = Session::begin(database.connect()?)?;

        let stored = find_by_id::<User>(session.conn(), claimed.id)?
            .ok_or_else(|| DataError::not_found("user", claimed.id))?;
        if stored.role == UserRole::Service || !stored.enabled {
            warn!(
                "event=context_open module=context status=denied kind=user user_id={} role={} enabled={}",
                claimed.id,
                stored.role.as_str(),
                stored.enabled
            );
            return Err(DataError::PermissionDenied(format!(
                "user `{}` cannot open a user context",
                stored.username
            )));
        }

        let principal = Principal::from_user(&stored)?;
        info!(
            "event=context_open module=context status=ok kind=user user_id={} role={}",
            principal.id,
            principal.role.as_str()
        );
        Ok(Self { session, principal })
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn users(&self) -> ResourceManager<'_, User> {
        ResourceManager::new(self.session.conn(), &self.principal)
    }

    pub fn tags(&self) -> ResourceManager<'_, Tag> {
        ResourceManager::new(self.session.conn(), &self.principal)
    }

    pub fn api_clients(&self) -> ResourceManager<'_, ApiClient> {
        ResourceManager::new(self.session.conn(), &self.principal)
    }

    pub fn api_tokens(&self) -> ResourceManager<'_, ApiToken> {
        ResourceManager::new(self.session.conn(), &self.principal)
    }

    pub fn user_settings(&self) -> ResourceManager<'_, UserSetting> {
        ResourceManager::new(self.session.conn(), &self.principal)
    }

    /// Links named scopes to a token the principal may update.
    pub fn assign_token_scopes(&self, token: &ApiToken, scopes: &[&str]) -> DataResult<()> {
        self.api_tokens().assign_scopes(token, scopes)
    }

    pub fn commit(self) -> DataResult<()> {
        self.session.commit()
    }

    pub fn rollback(self) -> DataResult<()> {
        self.session.rollback()
    }
}
