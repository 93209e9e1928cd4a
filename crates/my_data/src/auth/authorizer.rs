//! API token authorization.
//!
//! # Invariants
//! - A token is valid when it exists, is enabled, has not expired and its
//!   owner is enabled. A token issued through an API client also needs that
//!   client to be enabled and unexpired.
//! - Short-lived tokens carry the owner's full permissions, so scope
//!   policies evaluate them before looking at scopes.
//! - Resolution happens at most once per authorizer.

use super::now_millis;
use crate::error::{DataError, DataResult};
use crate::model::api::{ApiClient, ApiToken};
use crate::model::user::{User, UserRole};
use crate::store::MyData;
use log::{info, warn};
use once_cell::unsync::OnceCell;
use std::collections::BTreeSet;

/// Token record resolved together with its owner.
#[derive(Debug, Clone)]
pub struct ResolvedToken {
    pub token: ApiToken,
    pub user: User,
    /// Client the token was issued through, if any.
    pub client: Option<ApiClient>,
    pub scope_names: BTreeSet<String>,
    pub valid: bool,
}

/// Decides whether a resolved token (or its absence) is acceptable.
pub trait AuthorizationPolicy {
    fn authorize(&self, token: Option<&ResolvedToken>) -> DataResult<()>;

    /// Name used in log records.
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// Built-in token policies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenPolicy {
    /// Passes only when no valid token is presented.
    InvalidToken,
    /// Passes for any valid token.
    ValidToken,
    /// Passes only for a valid short-lived token.
    ShortLivedToken,
    /// Passes for a valid long-lived token holding every `required` scope,
    /// or for a valid short-lived token when `allow_short_lived` is set.
    Scopes {
        required: BTreeSet<String>,
        allow_short_lived: bool,
    },
}

impl TokenPolicy {
    pub fn scopes<I, S>(required: I, allow_short_lived: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Scopes {
            required: required.into_iter().map(Into::into).collect(),
            allow_short_lived,
        }
    }
}

fn deny(message: impl Into<String>) -> DataResult<()> {
    Err(DataError::Authorization(message.into()))
}

impl AuthorizationPolicy for TokenPolicy {
    fn name(&self) -> &'static str {
        match self {
            Self::InvalidToken => "invalid_token",
            Self::ValidToken => "valid_token",
            Self::ShortLivedToken => "short_lived_token",
            Self::Scopes { .. } => "scopes",
        }
    }

    fn authorize(&self, token: Option<&ResolvedToken>) -> DataResult<()> {
        let valid = token.filter(|resolved| resolved.valid);
        match (self, valid) {
            (Self::InvalidToken, None) => Ok(()),
            (Self::InvalidToken, Some(_)) => deny("a valid token must not be presented"),
            (_, None) => deny("a valid token is required"),
            (Self::ValidToken, Some(_)) => Ok(()),
            (Self::ShortLivedToken, Some(resolved)) => {
                if resolved.token.short_lived {
                    Ok(())
                } else {
                    deny("a short-lived token is required")
                }
            }
            (
                Self::Scopes {
                    required,
                    allow_short_lived,
                },
                Some(resolved),
            ) => {
                if resolved.token.short_lived {
                    return if *allow_short_lived {
                        Ok(())
                    } else {
                        deny("short-lived tokens are not accepted")
                    };
                }
                let missing: Vec<&str> = required
                    .difference(&resolved.scope_names)
                    .map(String::as_str)
                    .collect();
                if missing.is_empty() {
                    Ok(())
                } else {
                    deny(format!("missing scopes: {}", missing.join(", ")))
                }
            }
        }
    }
}

/// Validates one presented token string against one policy.
pub struct ApiTokenAuthorizer<'a, P = TokenPolicy> {
    my_data: &'a MyData,
    token: Option<String>,
    policy: P,
    resolved: OnceCell<Option<ResolvedToken>>,
}

impl<'a, P: AuthorizationPolicy> ApiTokenAuthorizer<'a, P> {
    pub fn new(my_data: &'a MyData, token: Option<&str>, policy: P) -> Self {
        Self {
            my_data,
            token: token.map(str::to_string),
            policy,
            resolved: OnceCell::new(),
        }
    }

    /// Applies the policy to the presented token.
    ///
    /// # Errors
    /// - `Authorization` when the policy rejects.
    /// - `Config`/`PermissionDenied` when the service account is unusable.
    pub fn authorize(&self) -> DataResult<()> {
        let resolved = self.resolve()?;
        let result = self.policy.authorize(resolved);
        let policy = self.policy.name();
        let token_id = resolved.and_then(|r| r.token.id).unwrap_or_default();
        match &result {
            Ok(()) => info!(
                "event=authorize module=auth status=ok policy={policy} token_id={token_id}"
            ),
            Err(err) => warn!(
                "event=authorize module=auth status=denied policy={policy} token_id={token_id} error={err}"
            ),
        }
        result
    }

    /// Resolved token, or `None` when no token string was presented or it
    /// is unknown. Invalid tokens resolve with `valid == false`.
    pub fn resolve(&self) -> DataResult<Option<&ResolvedToken>> {
        self.resolved
            .get_or_try_init(|| self.lookup())
            .map(Option::as_ref)
    }

    /// Owner of the presented token, when that token is valid.
    pub fn user(&self) -> DataResult<Option<&User>> {
        Ok(self.valid_token()?.map(|resolved| &resolved.user))
    }

    /// Presented token record, when that token is valid.
    pub fn api_token(&self) -> DataResult<Option<&ApiToken>> {
        Ok(self.valid_token()?.map(|resolved| &resolved.token))
    }

    pub fn is_valid_user(&self) -> DataResult<bool> {
        Ok(self.user()?.is_some())
    }

    pub fn is_root(&self) -> DataResult<bool> {
        self.has_role(UserRole::Root)
    }

    pub fn is_normal_user(&self) -> DataResult<bool> {
        self.has_role(UserRole::Normal)
    }

    pub fn is_service_user(&self) -> DataResult<bool> {
        self.has_role(UserRole::Service)
    }

    pub fn is_short_lived_token(&self) -> DataResult<bool> {
        Ok(self.api_token()?.is_some_and(|token| token.short_lived))
    }

    pub fn is_long_lived_token(&self) -> DataResult<bool> {
        Ok(self.api_token()?.is_some_and(|token| !token.short_lived))
    }

    fn has_role(&self, role: UserRole) -> DataResult<bool> {
        Ok(self.user()?.is_some_and(|user| user.role == role))
    }

    fn valid_token(&self) -> DataResult<Option<&ResolvedToken>> {
        Ok(self.resolve()?.filter(|resolved| resolved.valid))
    }

    fn lookup(&self) -> DataResult<Option<ResolvedToken>> {
        let Some(token) = self.token.as_deref() else {
            return Ok(None);
        };
        self.my_data.with_service_context(|context| {
            let api_token = match context.api_token(token) {
                Ok(api_token) => api_token,
                Err(DataError::NotFound { .. }) => return Ok(None),
                Err(err) => return Err(err),
            };
            let owner = api_token
                .user_id
                .ok_or_else(|| DataError::InvalidData("api token without owner".to_string()))?;
            let user = context.user_by_id(owner)?;
            let client = api_token
                .api_client_id
                .map(|id| context.api_client(id))
                .transpose()?;
            let scope_names = api_token.scope_names()?;
            let now = now_millis();
            let valid = api_token.is_usable_at(now)
                && user.enabled
                && client.as_ref().map_or(true, |client| client.is_usable_at(now));
            Ok(Some(ResolvedToken {
                token: api_token,
                user,
                client,
                scope_names,
                valid,
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthorizationPolicy, ResolvedToken, TokenPolicy};
    use crate::error::DataError;
    use crate::model::api::{ApiScope, ApiToken};
    use crate::model::relation::Relation;
    use crate::model::user::{User, UserRole};

    fn resolved(short_lived: bool, scopes: &[&str], valid: bool) -> ResolvedToken {
        let mut token = if short_lived {
            ApiToken::short_lived("session", i64::MAX)
        } else {
            ApiToken::new("cli")
        };
        token.scopes = Relation::Loaded(
            scopes
                .iter()
                .map(|name| ApiScope::parse(name).unwrap())
                .collect(),
        );
        ResolvedToken {
            scope_names: token.scope_names().unwrap(),
            token,
            user: User::new("alice", "alice@example.com", "Alice", UserRole::Normal),
            client: None,
            valid,
        }
    }

    fn is_denied(result: Result<(), DataError>) -> bool {
        matches!(result, Err(DataError::Authorization(_)))
    }

    #[test]
    fn invalid_token_policy_rejects_only_valid_tokens() {
        let policy = TokenPolicy::InvalidToken;
        assert!(policy.authorize(None).is_ok());
        assert!(policy.authorize(Some(&resolved(false, &[], false))).is_ok());
        assert!(is_denied(policy.authorize(Some(&resolved(false, &[], true)))));
    }

    #[test]
    fn short_lived_policy_requires_short_lived_tokens() {
        let policy = TokenPolicy::ShortLivedToken;
        assert!(policy.authorize(Some(&resolved(true, &[], true))).is_ok());
        assert!(is_denied(policy.authorize(Some(&resolved(false, &[], true)))));
        assert!(is_denied(policy.authorize(Some(&resolved(true, &[], false)))));
    }

    #[test]
    fn scope_policy_checks_superset_for_long_lived_tokens() {
        let policy = TokenPolicy::scopes(["tags.create", "tags.retrieve"], false);
        let both = resolved(false, &["tags.create", "tags.retrieve", "users.retrieve"], true);
        let one = resolved(false, &["tags.retrieve"], true);
        assert!(policy.authorize(Some(&both)).is_ok());
        assert!(is_denied(policy.authorize(Some(&one))));
    }

    #[test]
    fn scope_policy_lets_short_lived_tokens_through_only_when_allowed() {
        let token = resolved(true, &[], true);
        assert!(TokenPolicy::scopes(["tags.create"], true)
            .authorize(Some(&token))
            .is_ok());
        assert!(is_denied(
            TokenPolicy::scopes(["tags.create"], false).authorize(Some(&token))
        ));
    }
}
