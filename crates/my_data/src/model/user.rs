//! User account model.
//!
//! # Responsibility
//! - Define account identity, role and credential fields.
//! - Expose owned records through explicit relations.
//!
//! # Invariants
//! - `username` is unique and matches `USERNAME_RE`.
//! - `password_hash` is a PHC string produced by `credentials::hash_password`.
//! - `second_factor`, when set, is a base32 encoded TOTP secret.

use crate::credentials;
use crate::error::{DataError, DataResult};
use crate::model::api::{ApiClient, ApiToken};
use crate::model::relation::Relation;
use crate::model::tag::Tag;
use crate::model::user_setting::UserSetting;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub type UserId = i64;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]{1,64}$").expect("valid username regex"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

pub(crate) fn enabled_by_default() -> bool {
    true
}

/// Account role. Decides which context surface an account can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Sees and manages every row.
    Root,
    /// Sees and manages only its own rows.
    Normal,
    /// Looks up users and tokens; owns no data.
    Service,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Normal => "normal",
            Self::Service => "service",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "root" => Some(Self::Root),
            "normal" => Some(Self::Normal),
            "service" => Some(Self::Service),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<UserId>,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub role: UserRole,
    #[serde(skip)]
    pub password_hash: Option<String>,
    #[serde(skip)]
    pub second_factor: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(skip)]
    pub tags: Relation<Vec<Tag>>,
    #[serde(skip)]
    pub api_clients: Relation<Vec<ApiClient>>,
    #[serde(skip)]
    pub api_tokens: Relation<Vec<ApiToken>>,
    #[serde(skip)]
    pub user_settings: Relation<Vec<UserSetting>>,
}

impl User {
    /// Creates an enabled account without credentials.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        fullname: impl Into<String>,
        role: UserRole,
    ) -> Self {
        Self {
            id: None,
            username: username.into(),
            email: email.into(),
            fullname: fullname.into(),
            role,
            password_hash: None,
            second_factor: None,
            enabled: true,
            tags: Relation::Detached,
            api_clients: Relation::Detached,
            api_tokens: Relation::Detached,
            user_settings: Relation::Detached,
        }
    }

    /// Replaces the stored password hash.
    pub fn set_password(&mut self, password: &str) -> DataResult<()> {
        self.password_hash = Some(credentials::hash_password(password)?);
        Ok(())
    }

    /// Generates and stores a new second-factor secret, returning it.
    pub fn enable_second_factor(&mut self) -> String {
        let secret = credentials::generate_second_factor_secret();
        self.second_factor = Some(secret.clone());
        secret
    }

    pub fn is_root(&self) -> bool {
        self.role == UserRole::Root
    }

    pub fn tags(&self) -> DataResult<&[Tag]> {
        self.tags.get("user.tags").map(Vec::as_slice)
    }

    pub fn api_clients(&self) -> DataResult<&[ApiClient]> {
        self.api_clients.get("user.api_clients").map(Vec::as_slice)
    }

    pub fn api_tokens(&self) -> DataResult<&[ApiToken]> {
        self.api_tokens.get("user.api_tokens").map(Vec::as_slice)
    }

    pub fn user_settings(&self) -> DataResult<&[UserSetting]> {
        self.user_settings
            .get("user.user_settings")
            .map(Vec::as_slice)
    }

    pub fn validate(&self) -> DataResult<()> {
        if !USERNAME_RE.is_match(&self.username) {
            return Err(DataError::Validation(format!(
                "invalid username `{}`",
                self.username
            )));
        }
        if !EMAIL_RE.is_match(&self.email) {
            return Err(DataError::Validation(format!(
                "invalid email `{}`",
                self.email
            )));
        }
        if self.fullname.trim().is_empty() {
            return Err(DataError::Validation(
                "fullname must not be empty".to_string(),
            ));
        }
        if let Some(secret) = &self.second_factor {
            if !credentials::is_valid_second_factor_secret(secret) {
                return Err(DataError::Validation(
                    "second factor secret must be non-empty base32".to_string(),
                ));
            }
        }
        Ok(())
    }
}
