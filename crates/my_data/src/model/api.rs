//! API access models: clients, tokens and scopes.
//!
//! # Responsibility
//! - Define registered API clients and the tokens issued to users.
//! - Define named permissions (`module.subject`) grantable to tokens.
//!
//! # Invariants
//! - `ApiToken::token` is globally unique and alphanumeric.
//! - Short-lived tokens inherit the owner's full permissions; long-lived
//!   tokens are limited to their scopes.
//! - `expires` values are Unix epoch milliseconds.
//! - A token issued through a client is only as usable as that client.

use crate::credentials;
use crate::error::{DataError, DataResult};
use crate::model::relation::Relation;
use crate::model::user::{enabled_by_default, UserId};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type ApiClientId = i64;
pub type ApiTokenId = i64;
pub type ApiScopeId = i64;

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{16,128}$").expect("valid token regex"));
static SCOPE_PART_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid scope regex"));

/// Application registered by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiClient {
    #[serde(default)]
    pub id: Option<ApiClientId>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub app_name: String,
    pub app_publisher: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub expires: Option<i64>,
}

impl ApiClient {
    pub fn new(app_name: impl Into<String>, app_publisher: impl Into<String>) -> Self {
        Self {
            id: None,
            user_id: None,
            app_name: app_name.into(),
            app_publisher: app_publisher.into(),
            enabled: true,
            expires: None,
        }
    }

    pub fn validate(&self) -> DataResult<()> {
        if self.app_name.trim().is_empty() {
            return Err(DataError::Validation(
                "api client app_name must not be empty".to_string(),
            ));
        }
        if self.app_publisher.trim().is_empty() {
            return Err(DataError::Validation(
                "api client app_publisher must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires.is_some_and(|expires| expires <= now_ms)
    }

    /// Enabled and not expired at `now_ms`.
    pub fn is_usable_at(&self, now_ms: i64) -> bool {
        self.enabled && !self.is_expired_at(now_ms)
    }
}

/// Credential string bound to one user and optionally one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiToken {
    #[serde(default)]
    pub id: Option<ApiTokenId>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub api_client_id: Option<ApiClientId>,
    pub title: String,
    #[serde(default = "credentials::generate_api_token")]
    pub token: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub expires: Option<i64>,
    #[serde(default)]
    pub short_lived: bool,
    #[serde(skip)]
    pub scopes: Relation<Vec<ApiScope>>,
}

impl ApiToken {
    /// Long-lived token with a fresh random token string and no expiry.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            user_id: None,
            api_client_id: None,
            title: title.into(),
            token: credentials::generate_api_token(),
            enabled: true,
            expires: None,
            short_lived: false,
            scopes: Relation::Detached,
        }
    }

    /// Short-lived token expiring at `expires` (epoch milliseconds).
    pub fn short_lived(title: impl Into<String>, expires: i64) -> Self {
        Self {
            expires: Some(expires),
            short_lived: true,
            ..Self::new(title)
        }
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires.is_some_and(|expires| expires <= now_ms)
    }

    /// Enabled and not expired at `now_ms`.
    pub fn is_usable_at(&self, now_ms: i64) -> bool {
        self.enabled && !self.is_expired_at(now_ms)
    }

    pub fn scopes(&self) -> DataResult<&[ApiScope]> {
        self.scopes.get("api_token.scopes").map(Vec::as_slice)
    }

    /// Full names (`module.subject`) of the loaded scopes.
    pub fn scope_names(&self) -> DataResult<BTreeSet<String>> {
        Ok(self.scopes()?.iter().map(ApiScope::full_scope_name).collect())
    }

    pub fn validate(&self) -> DataResult<()> {
        if self.title.trim().is_empty() {
            return Err(DataError::Validation(
                "api token title must not be empty".to_string(),
            ));
        }
        if !TOKEN_RE.is_match(&self.token) {
            return Err(DataError::Validation(
                "api token must be 16-128 alphanumeric characters".to_string(),
            ));
        }
        Ok(())
    }
}

/// Named permission, e.g. `tags.create`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApiScope {
    #[serde(default)]
    pub id: Option<ApiScopeId>,
    pub module: String,
    pub subject: String,
}

impl ApiScope {
    pub fn new(module: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            id: None,
            module: module.into(),
            subject: subject.into(),
        }
    }

    /// Parses `module.subject`.
    pub fn parse(full_name: &str) -> DataResult<Self> {
        let (module, subject) = full_name.split_once('.').ok_or_else(|| {
            DataError::Validation(format!("scope `{full_name}` is not `module.subject`"))
        })?;
        let scope = Self::new(module, subject);
        scope.validate()?;
        Ok(scope)
    }

    pub fn full_scope_name(&self) -> String {
        format!("{}.{}", self.module, self.subject)
    }

    pub fn validate(&self) -> DataResult<()> {
        for part in [&self.module, &self.subject] {
            if !SCOPE_PART_RE.is_match(part) {
                return Err(DataError::Validation(format!(
                    "invalid scope part `{part}`"
                )));
            }
        }
        Ok(())
    }
}

/// Association row between a token and a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiTokenScope {
    #[serde(default)]
    pub id: Option<i64>,
    pub api_token_id: ApiTokenId,
    pub api_scope_id: ApiScopeId,
}

#[cfg(test)]
mod tests {
    use super::{ApiClient, ApiScope, ApiToken};
    use crate::error::DataError;

    #[test]
    fn full_scope_name_joins_module_and_subject() {
        let scope = ApiScope::new("mymodule", "mysubject");
        assert_eq!(scope.full_scope_name(), "mymodule.mysubject");
    }

    #[test]
    fn parse_rejects_names_without_subject() {
        assert!(matches!(
            ApiScope::parse("tags"),
            Err(DataError::Validation(_))
        ));
        assert_eq!(ApiScope::parse("tags.create").unwrap().subject, "create");
    }

    #[test]
    fn new_tokens_get_random_valid_token_strings() {
        let first = ApiToken::new("cli");
        let second = ApiToken::new("cli");
        assert_ne!(first.token, second.token);
        assert!(first.validate().is_ok());
        assert!(!first.short_lived);
    }

    #[test]
    fn expiry_and_enabled_decide_usability() {
        let mut token = ApiToken::short_lived("session", 1_000);
        assert!(token.is_usable_at(999));
        assert!(!token.is_usable_at(1_000));

        token.expires = None;
        token.enabled = false;
        assert!(!token.is_usable_at(0));
    }

    #[test]
    fn clients_expire_like_tokens() {
        let mut client = ApiClient::new("app", "publisher");
        assert!(client.is_usable_at(i64::MAX));

        client.expires = Some(1_000);
        assert!(client.is_usable_at(999));
        assert!(!client.is_usable_at(1_000));

        client.expires = None;
        client.enabled = false;
        assert!(!client.is_usable_at(0));
    }

    #[test]
    fn scope_names_require_loaded_scopes() {
        let token = ApiToken::new("cli");
        assert!(matches!(
            token.scope_names(),
            Err(DataError::DetachedEntity("api_token.scopes"))
        ));
    }
}
