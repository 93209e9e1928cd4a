//! Declarative bulk loading of bootstrap and fixture data.
//!
//! # Responsibility
//! - Describe a full data set (scopes, users with owned rows, token scopes).
//! - Insert it in one transaction, keeping caller-provided ids.
//!
//! # Invariants
//! - Either the whole data set is stored or nothing is.
//! - References between records are checked; dangling ones fail with
//!   `DataLoad`.
//! - Loading is not idempotent; a second load trips unique constraints.

mod source;

pub use source::{DataSource, InitialDataSource, JsonDataSource, StaticDataSource};

use crate::error::{DataError, DataResult};
use crate::model::api::{ApiClient, ApiScope, ApiToken, ApiTokenScope};
use crate::model::tag::Tag;
use crate::model::user::{enabled_by_default, User, UserId, UserRole};
use crate::model::user_setting::UserSetting;
use crate::repo::api_repo::{insert_scope, link_token_scope, scope_exists, token_exists};
use crate::repo::Resource;
use crate::store::MyData;
use log::{error, info};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;

/// Complete data set accepted by `DataLoader`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSet {
    #[serde(default)]
    pub api_scopes: Vec<ApiScope>,
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub api_token_scopes: Vec<ApiTokenScope>,
}

impl DataSet {
    pub fn from_json_str(raw: &str) -> DataResult<Self> {
        serde_json::from_str(raw)
            .map_err(|err| DataError::DataLoad(format!("invalid data set json: {err}")))
    }
}

/// One user with the rows it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub id: Option<UserId>,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub role: UserRole,
    /// Plain text; hashed on load.
    #[serde(default, rename = "_password")]
    pub password: Option<String>,
    #[serde(default)]
    pub second_factor: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default, rename = "_tags")]
    pub tags: Vec<Tag>,
    #[serde(default, rename = "_api_clients")]
    pub api_clients: Vec<ApiClient>,
    #[serde(default, rename = "_api_tokens")]
    pub api_tokens: Vec<ApiToken>,
    #[serde(default, rename = "_user_settings")]
    pub user_settings: Vec<UserSetting>,
}

impl UserRecord {
    fn to_user(&self) -> DataResult<User> {
        let mut user = User::new(
            self.username.as_str(),
            self.email.as_str(),
            self.fullname.as_str(),
            self.role,
        );
        user.id = self.id;
        user.enabled = self.enabled;
        user.second_factor = self.second_factor.clone();
        if let Some(password) = &self.password {
            user.set_password(password)?;
        }
        Ok(user)
    }
}

/// Row counts written by one load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub api_scopes: usize,
    pub users: usize,
    pub tags: usize,
    pub api_clients: usize,
    pub api_tokens: usize,
    pub user_settings: usize,
    pub api_token_scopes: usize,
}

/// Loads the data set of a `DataSource` into a `MyData` store.
#[derive(Debug)]
pub struct DataLoader<S> {
    source: S,
}

impl<S: DataSource> DataLoader<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Inserts the whole data set in one transaction.
    ///
    /// # Errors
    /// - `DataLoad` for unreadable sources and dangling references.
    /// - `Validation` for invalid records and unique violations.
    pub fn load(&self, my_data: &MyData) -> DataResult<LoadSummary> {
        let started_at = Instant::now();
        let source = self.source.name();
        info!("event=data_load module=loader status=start source={source}");

        let result = self.source.data_set().and_then(|data_set| {
            let mut conn = my_data.database().connect()?;
            let tx = conn.transaction()?;
            let summary = load_data_set(&tx, &data_set)?;
            tx.commit()?;
            Ok(summary)
        });

        match &result {
            Ok(summary) => info!(
                "event=data_load module=loader status=ok source={source} users={} api_tokens={} duration_ms={}",
                summary.users,
                summary.api_tokens,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=data_load module=loader status=error source={source} error_code={} error={err}",
                err.code()
            ),
        }
        result
    }
}

fn load_data_set(conn: &Connection, data_set: &DataSet) -> DataResult<LoadSummary> {
    let mut summary = LoadSummary::default();

    for scope in &data_set.api_scopes {
        insert_scope(conn, scope)?;
        summary.api_scopes += 1;
    }

    for record in &data_set.users {
        let user_id = record.to_user()?.insert(conn)?;
        summary.users += 1;

        for tag in &record.tags {
            insert_owned(conn, tag.clone(), user_id)?;
            summary.tags += 1;
        }

        let mut client_ids = HashSet::new();
        for client in &record.api_clients {
            client_ids.insert(insert_owned(conn, client.clone(), user_id)?);
            summary.api_clients += 1;
        }

        for token in &record.api_tokens {
            if let Some(client_id) = token.api_client_id {
                if !client_ids.contains(&client_id) {
                    return Err(DataError::DataLoad(format!(
                        "api token `{}` of user `{}` references unknown api client {client_id}",
                        token.title, record.username
                    )));
                }
            }
            insert_owned(conn, token.clone(), user_id)?;
            summary.api_tokens += 1;
        }

        for setting in &record.user_settings {
            insert_owned(conn, setting.clone(), user_id)?;
            summary.user_settings += 1;
        }
    }

    for link in &data_set.api_token_scopes {
        if !token_exists(conn, link.api_token_id)? {
            return Err(DataError::DataLoad(format!(
                "api token scope references unknown api token {}",
                link.api_token_id
            )));
        }
        if !scope_exists(conn, link.api_scope_id)? {
            return Err(DataError::DataLoad(format!(
                "api token scope references unknown api scope {}",
                link.api_scope_id
            )));
        }
        link_token_scope(conn, link.id, link.api_token_id, link.api_scope_id)?;
        summary.api_token_scopes += 1;
    }

    Ok(summary)
}

fn insert_owned<R: Resource>(conn: &Connection, mut row: R, owner: UserId) -> DataResult<i64> {
    row.stamp_owner(owner);
    row.normalize();
    row.insert(conn)
}

#[cfg(test)]
mod tests {
    use super::DataSet;
    use crate::model::user::UserRole;

    #[test]
    fn parses_nested_user_records() {
        let data_set = DataSet::from_json_str(
            r#"{
                "users": [{
                    "id": 9,
                    "username": "alice",
                    "email": "alice@example.com",
                    "fullname": "Alice",
                    "role": "normal",
                    "_password": "pw",
                    "_tags": [{"title": "home"}],
                    "_api_tokens": [{"title": "cli", "token": "abcdefghijklmnop"}]
                }]
            }"#,
        )
        .unwrap();

        let alice = &data_set.users[0];
        assert_eq!(alice.role, UserRole::Normal);
        assert_eq!(alice.password.as_deref(), Some("pw"));
        assert!(alice.enabled);
        assert_eq!(alice.tags[0].title, "home");
        assert!(!alice.api_tokens[0].short_lived);
        assert!(data_set.api_scopes.is_empty());
    }

    #[test]
    fn rejects_malformed_json() {
        let err = DataSet::from_json_str("{").unwrap_err();
        assert_eq!(err.code(), "data_load_failed");
    }
}
