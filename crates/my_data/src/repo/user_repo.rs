//! User account persistence.
//!
//! # Invariants
//! - `role` is stored as its lowercase name; unknown values are rejected on
//!   read.
//! - A non-root principal may not change any account's role.

use super::{bool_to_int, int_to_bool, query_rows, AccessRule, Resource};
use crate::context::Principal;
use crate::error::{DataError, DataResult};
use crate::model::api::{ApiClient, ApiToken};
use crate::model::relation::Relation;
use crate::model::tag::Tag;
use crate::model::user::{User, UserId, UserRole};
use crate::model::user_setting::UserSetting;
use crate::repo::filter::Filter;
use rusqlite::{params, Connection, Row};

impl Resource for User {
    const KIND: &'static str = "user";
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "username",
        "email",
        "fullname",
        "role",
        "password_hash",
        "second_factor",
        "enabled",
    ];
    const ACCESS: AccessRule = AccessRule::UserAccount;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn owner_id(&self) -> Option<UserId> {
        self.id
    }

    fn stamp_owner(&mut self, _owner: UserId) {}

    fn validate(&self) -> DataResult<()> {
        User::validate(self)
    }

    fn from_row(row: &Row<'_>) -> DataResult<Self> {
        let role_text: String = row.get("role")?;
        let role = UserRole::parse(&role_text).ok_or_else(|| {
            DataError::InvalidData(format!("invalid role `{role_text}` in users.role"))
        })?;

        Ok(Self {
            id: Some(row.get("id")?),
            username: row.get("username")?,
            email: row.get("email")?,
            fullname: row.get("fullname")?,
            role,
            password_hash: row.get("password_hash")?,
            second_factor: row.get("second_factor")?,
            enabled: int_to_bool(row, "users", "enabled")?,
            tags: Relation::Detached,
            api_clients: Relation::Detached,
            api_tokens: Relation::Detached,
            user_settings: Relation::Detached,
        })
    }

    fn insert(&self, conn: &Connection) -> DataResult<i64> {
        self.validate()?;
        conn.execute(
            "INSERT INTO users (
                id,
                username,
                email,
                fullname,
                role,
                password_hash,
                second_factor,
                enabled
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                self.id,
                self.username.as_str(),
                self.email.as_str(),
                self.fullname.as_str(),
                self.role.as_str(),
                self.password_hash.as_deref(),
                self.second_factor.as_deref(),
                bool_to_int(self.enabled),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update(&self, conn: &Connection) -> DataResult<usize> {
        self.validate()?;
        Ok(conn.execute(
            "UPDATE users
             SET
                username = ?1,
                email = ?2,
                fullname = ?3,
                role = ?4,
                password_hash = ?5,
                second_factor = ?6,
                enabled = ?7
             WHERE id = ?8;",
            params![
                self.username.as_str(),
                self.email.as_str(),
                self.fullname.as_str(),
                self.role.as_str(),
                self.password_hash.as_deref(),
                self.second_factor.as_deref(),
                bool_to_int(self.enabled),
                self.id,
            ],
        )?)
    }

    fn guard_update(&self, stored: &Self, principal: &Principal) -> DataResult<()> {
        if !principal.is_root() && stored.role != self.role {
            return Err(DataError::PermissionDenied(format!(
                "user `{}` may not change roles",
                principal.username
            )));
        }
        Ok(())
    }

    fn load_relations(&mut self, conn: &Connection) -> DataResult<()> {
        let Some(id) = self.id else {
            return Err(DataError::Validation(
                "cannot load relations of an unsaved user".to_string(),
            ));
        };
        let owned = Filter::eq("user_id", id);

        let mut api_tokens: Vec<ApiToken> = query_rows(conn, Some(&owned), &[], 0, None)?;
        for token in &mut api_tokens {
            token.load_relations(conn)?;
        }

        self.tags = Relation::Loaded(query_rows::<Tag>(conn, Some(&owned), &[], 0, None)?);
        self.api_clients =
            Relation::Loaded(query_rows::<ApiClient>(conn, Some(&owned), &[], 0, None)?);
        self.api_tokens = Relation::Loaded(api_tokens);
        self.user_settings =
            Relation::Loaded(query_rows::<UserSetting>(conn, Some(&owned), &[], 0, None)?);
        Ok(())
    }
}

/// Account with `username`, regardless of role or state.
pub(crate) fn find_by_username(conn: &Connection, username: &str) -> DataResult<Option<User>> {
    let filter = Filter::eq("username", username);
    Ok(query_rows::<User>(conn, Some(&filter), &[], 0, Some(1))?
        .into_iter()
        .next())
}
