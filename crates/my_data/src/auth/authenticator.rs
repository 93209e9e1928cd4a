//! User authentication strategies.

use super::now_millis;
use crate::context::ServiceContext;
use crate::credentials;
use crate::error::{DataError, DataResult};
use crate::model::api::ApiToken;
use crate::model::user::{User, UserRole};
use crate::store::MyData;
use log::{info, warn};

/// Strategy that resolves and verifies one user.
pub trait Authenticator {
    /// Returns the authenticated user or `DataError::Authentication`.
    fn authenticate(&self, context: &ServiceContext) -> DataResult<User>;
}

/// Username, password and optional TOTP code.
#[derive(Clone)]
pub struct CredentialsAuthenticator {
    pub username: String,
    pub password: String,
    pub second_factor: Option<String>,
}

impl CredentialsAuthenticator {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            second_factor: None,
        }
    }

    pub fn with_second_factor(mut self, code: impl Into<String>) -> Self {
        self.second_factor = Some(code.into());
        self
    }

    fn reject(&self, reason: &str) -> DataError {
        warn!(
            "event=authenticate module=auth status=denied username={} reason={reason}",
            self.username
        );
        DataError::Authentication
    }

    fn check_second_factor(&self, user: &User) -> DataResult<()> {
        match (user.second_factor.as_deref(), self.second_factor.as_deref()) {
            (None, None) => Ok(()),
            (Some(_), None) => Err(self.reject("second_factor_missing")),
            (None, Some(_)) => Err(self.reject("second_factor_unexpected")),
            (Some(secret), Some(code)) => {
                let now_secs = u64::try_from(now_millis() / 1_000).unwrap_or_default();
                match credentials::verify_second_factor(secret, code, now_secs) {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(self.reject("second_factor_mismatch")),
                    Err(err) => {
                        warn!(
                            "event=authenticate module=auth status=error username={} error={err}",
                            self.username
                        );
                        Err(DataError::Authentication)
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for CredentialsAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsAuthenticator")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("second_factor", &self.second_factor.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Authenticator for CredentialsAuthenticator {
    fn authenticate(&self, context: &ServiceContext) -> DataResult<User> {
        let user = match context.user_by_username(&self.username) {
            Ok(user) => user,
            Err(DataError::NotFound { .. }) => return Err(self.reject("unknown_user")),
            Err(err) => return Err(err),
        };

        if user.role == UserRole::Service {
            return Err(self.reject("service_user"));
        }
        if !user.enabled {
            return Err(self.reject("disabled"));
        }
        let password_ok = user
            .password_hash
            .as_deref()
            .is_some_and(|hash| credentials::verify_password(&self.password, hash));
        if !password_ok {
            return Err(self.reject("bad_password"));
        }
        self.check_second_factor(&user)?;

        info!(
            "event=authenticate module=auth status=ok username={} role={}",
            user.username,
            user.role.as_str()
        );
        Ok(user)
    }
}

/// Authenticates through the configured service account of a `MyData`.
pub struct UserAuthenticator<'a, A> {
    my_data: &'a MyData,
    authenticator: A,
}

impl<'a, A: Authenticator> UserAuthenticator<'a, A> {
    pub fn new(my_data: &'a MyData, authenticator: A) -> Self {
        Self {
            my_data,
            authenticator,
        }
    }

    /// Runs the strategy inside a service context.
    ///
    /// # Errors
    /// - `Authentication` when the strategy rejects the credentials.
    /// - `Config`/`PermissionDenied` when the service account is unusable.
    pub fn authenticate(&self) -> DataResult<User> {
        self.my_data
            .with_service_context(|context| self.authenticator.authenticate(context))
    }

    /// Authenticates, then issues a short-lived token valid for
    /// `session_timeout_seconds`. Returns the token string.
    ///
    /// # Errors
    /// - `Authentication` as for `authenticate`.
    /// - `TokenCreation` when the token cannot be persisted.
    pub fn create_api_token(&self, session_timeout_seconds: u64, title: &str) -> DataResult<String> {
        let user = self.authenticate()?;

        let expires = i64::try_from(session_timeout_seconds)
            .ok()
            .and_then(|secs| secs.checked_mul(1_000))
            .and_then(|millis| now_millis().checked_add(millis))
            .ok_or_else(|| {
                DataError::TokenCreation(Box::new(DataError::Validation(format!(
                    "session timeout {session_timeout_seconds}s is out of range"
                ))))
            })?;

        let created = self
            .my_data
            .with_user_context(&user, |context| {
                context
                    .api_tokens()
                    .create_one(ApiToken::short_lived(title, expires))
            })
            .map_err(|err| DataError::TokenCreation(Box::new(err)))?;

        info!(
            "event=token_create module=auth status=ok user_id={} token_id={} expires={}",
            created.user_id.unwrap_or_default(),
            created.id.unwrap_or_default(),
            expires
        );
        Ok(created.token)
    }
}
