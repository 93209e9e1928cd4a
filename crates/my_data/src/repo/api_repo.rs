//! API client, token and scope persistence.
//!
//! # Responsibility
//! - Map `ApiClient` and `ApiToken` through the `Resource` contract.
//! - Provide scope lookup and token/scope association helpers.
//!
//! # Invariants
//! - A token's `api_client_id`, when set, refers to a client of the same user.
//! - Token scopes are loaded through `api_token_scopes`, ordered by scope id.

use super::{bool_to_int, int_to_bool, query_rows, AccessRule, Resource};
use crate::error::{DataError, DataResult};
use crate::model::api::{ApiClient, ApiScope, ApiScopeId, ApiToken, ApiTokenId};
use crate::model::relation::Relation;
use crate::model::user::UserId;
use crate::repo::filter::Filter;
use rusqlite::{params, Connection, OptionalExtension, Row};

impl Resource for ApiClient {
    const KIND: &'static str = "api_client";
    const TABLE: &'static str = "api_clients";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "app_name",
        "app_publisher",
        "enabled",
        "expires",
    ];
    const ACCESS: AccessRule = AccessRule::UserScoped;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn owner_id(&self) -> Option<UserId> {
        self.user_id
    }

    fn stamp_owner(&mut self, owner: UserId) {
        self.user_id = Some(owner);
    }

    fn validate(&self) -> DataResult<()> {
        ApiClient::validate(self)
    }

    fn from_row(row: &Row<'_>) -> DataResult<Self> {
        Ok(Self {
            id: Some(row.get("id")?),
            user_id: Some(row.get("user_id")?),
            app_name: row.get("app_name")?,
            app_publisher: row.get("app_publisher")?,
            enabled: int_to_bool(row, "api_clients", "enabled")?,
            expires: row.get("expires")?,
        })
    }

    fn insert(&self, conn: &Connection) -> DataResult<i64> {
        self.validate()?;
        conn.execute(
            "INSERT INTO api_clients (id, user_id, app_name, app_publisher, enabled, expires)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                self.id,
                self.user_id,
                self.app_name.as_str(),
                self.app_publisher.as_str(),
                bool_to_int(self.enabled),
                self.expires,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update(&self, conn: &Connection) -> DataResult<usize> {
        self.validate()?;
        Ok(conn.execute(
            "UPDATE api_clients
             SET app_name = ?1, app_publisher = ?2, enabled = ?3, expires = ?4
             WHERE id = ?5;",
            params![
                self.app_name.as_str(),
                self.app_publisher.as_str(),
                bool_to_int(self.enabled),
                self.expires,
                self.id,
            ],
        )?)
    }
}

impl Resource for ApiToken {
    const KIND: &'static str = "api_token";
    const TABLE: &'static str = "api_tokens";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "api_client_id",
        "title",
        "token",
        "enabled",
        "expires",
        "short_lived",
    ];
    const ACCESS: AccessRule = AccessRule::UserScoped;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn owner_id(&self) -> Option<UserId> {
        self.user_id
    }

    fn stamp_owner(&mut self, owner: UserId) {
        self.user_id = Some(owner);
    }

    fn validate(&self) -> DataResult<()> {
        ApiToken::validate(self)
    }

    fn from_row(row: &Row<'_>) -> DataResult<Self> {
        Ok(Self {
            id: Some(row.get("id")?),
            user_id: Some(row.get("user_id")?),
            api_client_id: row.get("api_client_id")?,
            title: row.get("title")?,
            token: row.get("token")?,
            enabled: int_to_bool(row, "api_tokens", "enabled")?,
            expires: row.get("expires")?,
            short_lived: int_to_bool(row, "api_tokens", "short_lived")?,
            scopes: Relation::Detached,
        })
    }

    fn insert(&self, conn: &Connection) -> DataResult<i64> {
        self.validate()?;
        check_client_owner(conn, self.api_client_id, self.user_id)?;
        conn.execute(
            "INSERT INTO api_tokens (
                id,
                user_id,
                api_client_id,
                title,
                token,
                enabled,
                expires,
                short_lived
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                self.id,
                self.user_id,
                self.api_client_id,
                self.title.as_str(),
                self.token.as_str(),
                bool_to_int(self.enabled),
                self.expires,
                bool_to_int(self.short_lived),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update(&self, conn: &Connection) -> DataResult<usize> {
        self.validate()?;
        let owner = match self.id {
            Some(id) => super::find_owner::<Self>(conn, id)?,
            None => None,
        };
        check_client_owner(conn, self.api_client_id, owner)?;
        Ok(conn.execute(
            "UPDATE api_tokens
             SET
                api_client_id = ?1,
                title = ?2,
                token = ?3,
                enabled = ?4,
                expires = ?5,
                short_lived = ?6
             WHERE id = ?7;",
            params![
                self.api_client_id,
                self.title.as_str(),
                self.token.as_str(),
                bool_to_int(self.enabled),
                self.expires,
                bool_to_int(self.short_lived),
                self.id,
            ],
        )?)
    }

    fn load_relations(&mut self, conn: &Connection) -> DataResult<()> {
        let Some(id) = self.id else {
            return Err(DataError::Validation(
                "cannot load relations of an unsaved api token".to_string(),
            ));
        };
        self.scopes = Relation::Loaded(scopes_of_token(conn, id)?);
        Ok(())
    }
}

fn check_client_owner(
    conn: &Connection,
    api_client_id: Option<i64>,
    user_id: Option<UserId>,
) -> DataResult<()> {
    let Some(client_id) = api_client_id else {
        return Ok(());
    };
    let client_owner: Option<UserId> = conn
        .query_row(
            "SELECT user_id FROM api_clients WHERE id = ?1",
            [client_id],
            |row| row.get(0),
        )
        .optional()?;
    match client_owner {
        Some(owner) if Some(owner) == user_id => Ok(()),
        Some(_) => Err(DataError::Validation(format!(
            "api client {client_id} belongs to another user"
        ))),
        None => Err(DataError::Validation(format!(
            "api client {client_id} does not exist"
        ))),
    }
}

fn parse_scope_row(row: &Row<'_>) -> DataResult<ApiScope> {
    let scope = ApiScope {
        id: Some(row.get("id")?),
        module: row.get("module")?,
        subject: row.get("subject")?,
    };
    scope.validate().map_err(|_| {
        DataError::InvalidData(format!(
            "invalid scope `{}` in api_scopes",
            scope.full_scope_name()
        ))
    })?;
    Ok(scope)
}

fn scopes_of_token(conn: &Connection, token_id: ApiTokenId) -> DataResult<Vec<ApiScope>> {
    let mut stmt = conn.prepare(
        "SELECT s.id AS id, s.module AS module, s.subject AS subject
         FROM api_scopes s
         JOIN api_token_scopes ts ON ts.api_scope_id = s.id
         WHERE ts.api_token_id = ?1
         ORDER BY s.id ASC;",
    )?;
    let mut rows = stmt.query([token_id])?;
    let mut scopes = Vec::new();
    while let Some(row) = rows.next()? {
        scopes.push(parse_scope_row(row)?);
    }
    Ok(scopes)
}

/// Every known scope, ordered by id.
pub(crate) fn list_scopes(conn: &Connection) -> DataResult<Vec<ApiScope>> {
    let mut stmt = conn.prepare("SELECT id, module, subject FROM api_scopes ORDER BY id ASC;")?;
    let mut rows = stmt.query([])?;
    let mut scopes = Vec::new();
    while let Some(row) = rows.next()? {
        scopes.push(parse_scope_row(row)?);
    }
    Ok(scopes)
}

pub(crate) fn find_scope(conn: &Connection, module: &str, subject: &str) -> DataResult<Option<ApiScope>> {
    let mut stmt = conn
        .prepare("SELECT id, module, subject FROM api_scopes WHERE module = ?1 AND subject = ?2;")?;
    let mut rows = stmt.query(params![module, subject])?;
    match rows.next()? {
        Some(row) => Ok(Some(parse_scope_row(row)?)),
        None => Ok(None),
    }
}

pub(crate) fn scope_exists(conn: &Connection, scope_id: ApiScopeId) -> DataResult<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM api_scopes WHERE id = ?1", [scope_id], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn token_exists(conn: &Connection, token_id: ApiTokenId) -> DataResult<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM api_tokens WHERE id = ?1", [token_id], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

/// Inserts a scope, keeping `id` when set.
pub(crate) fn insert_scope(conn: &Connection, scope: &ApiScope) -> DataResult<ApiScopeId> {
    scope.validate()?;
    conn.execute(
        "INSERT INTO api_scopes (id, module, subject) VALUES (?1, ?2, ?3);",
        params![scope.id, scope.module.as_str(), scope.subject.as_str()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Links a scope to a token. Linking twice is a `Validation` error.
pub(crate) fn link_token_scope(
    conn: &Connection,
    id: Option<i64>,
    token_id: ApiTokenId,
    scope_id: ApiScopeId,
) -> DataResult<()> {
    conn.execute(
        "INSERT INTO api_token_scopes (id, api_token_id, api_scope_id) VALUES (?1, ?2, ?3);",
        params![id, token_id, scope_id],
    )?;
    Ok(())
}

/// Token with the exact `token` string, regardless of state.
pub(crate) fn find_by_token(conn: &Connection, token: &str) -> DataResult<Option<ApiToken>> {
    let filter = Filter::eq("token", token);
    Ok(query_rows::<ApiToken>(conn, Some(&filter), &[], 0, Some(1))?
        .into_iter()
        .next())
}
