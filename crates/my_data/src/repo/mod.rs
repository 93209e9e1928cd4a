//! Repository layer: row mapping and SQL for every managed entity.
//!
//! # Responsibility
//! - Map each model to its table through the `Resource` contract.
//! - Provide the generic select/count/delete helpers resource managers use.
//!
//! # Invariants
//! - Write paths call `Resource::validate()` before SQL mutations.
//! - Values are written exactly as given; callers normalize them first.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Owner columns are written on insert only; updates never rewrite them.
//! - Nothing here checks permissions; that is the resource manager's job.

pub mod api_repo;
pub mod filter;
pub mod tag_repo;
pub mod user_repo;
pub mod user_setting_repo;

use crate::context::Principal;
use crate::error::{DataError, DataResult};
use crate::model::user::UserId;
use filter::{Filter, Sort};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};

/// How ownership of a row is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRule {
    /// The row is a user account; it is owned by itself (`id`).
    UserAccount,
    /// The row belongs to the user in `user_id`.
    UserScoped,
}

impl AccessRule {
    pub fn owner_column(self) -> &'static str {
        match self {
            Self::UserAccount => "id",
            Self::UserScoped => "user_id",
        }
    }
}

/// Persistence contract of a managed entity.
pub trait Resource: Sized {
    /// Name used in errors and log records.
    const KIND: &'static str;
    const TABLE: &'static str;
    /// Selectable, filterable and sortable columns. The first is `id`.
    const COLUMNS: &'static [&'static str];
    const ACCESS: AccessRule;

    fn id(&self) -> Option<i64>;
    fn set_id(&mut self, id: i64);
    /// Owning user as stored on this value.
    fn owner_id(&self) -> Option<UserId>;
    /// Sets the owning user. Has no effect on user accounts.
    fn stamp_owner(&mut self, owner: UserId);
    fn validate(&self) -> DataResult<()>;
    /// Rewrites fields into their stored form. Runs before every write, so the
    /// value handed back to callers matches the row.
    fn normalize(&mut self) {}
    fn from_row(row: &Row<'_>) -> DataResult<Self>;
    /// Inserts this value, keeping `id` when set, and returns the row id.
    fn insert(&self, conn: &Connection) -> DataResult<i64>;
    /// Rewrites the non-owner columns. Returns the number of changed rows.
    fn update(&self, conn: &Connection) -> DataResult<usize>;

    /// Extra rules an update must satisfy given the stored row.
    fn guard_update(&self, _stored: &Self, _principal: &Principal) -> DataResult<()> {
        Ok(())
    }

    /// Materializes this value's relations.
    fn load_relations(&mut self, _conn: &Connection) -> DataResult<()> {
        Ok(())
    }
}

fn select_sql<R: Resource>() -> String {
    format!("SELECT {} FROM {}", R::COLUMNS.join(", "), R::TABLE)
}

fn push_where<R: Resource>(
    filter: Option<&Filter>,
    sql: &mut String,
    params: &mut Vec<Value>,
) -> DataResult<()> {
    if let Some(filter) = filter {
        sql.push_str(" WHERE ");
        filter.write_sql(R::COLUMNS, sql, params)?;
    }
    Ok(())
}

/// Rows of `R` matching `filter`, ordered by `sort` (default `id ASC`).
pub(crate) fn query_rows<R: Resource>(
    conn: &Connection,
    filter: Option<&Filter>,
    sort: &[Sort],
    start: u32,
    max_items: Option<u32>,
) -> DataResult<Vec<R>> {
    let mut sql = select_sql::<R>();
    let mut bind_values: Vec<Value> = Vec::new();
    push_where::<R>(filter, &mut sql, &mut bind_values)?;

    sql.push_str(" ORDER BY ");
    if sort.is_empty() {
        sql.push_str("id ASC");
    } else {
        for (index, key) in sort.iter().enumerate() {
            if index > 0 {
                sql.push_str(", ");
            }
            key.write_sql(R::COLUMNS, &mut sql)?;
        }
    }

    if let Some(limit) = max_items {
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
        if start > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(start)));
        }
    } else if start > 0 {
        sql.push_str(" LIMIT -1 OFFSET ?");
        bind_values.push(Value::Integer(i64::from(start)));
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(R::from_row(row)?);
    }
    Ok(items)
}

/// Number of `R` rows matching `filter`.
pub(crate) fn count_rows<R: Resource>(conn: &Connection, filter: Option<&Filter>) -> DataResult<u64> {
    let mut sql = format!("SELECT COUNT(*) FROM {}", R::TABLE);
    let mut bind_values: Vec<Value> = Vec::new();
    push_where::<R>(filter, &mut sql, &mut bind_values)?;

    let count: i64 = conn.query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
    u64::try_from(count).map_err(|_| DataError::InvalidData(format!("negative count {count}")))
}

/// Row of `R` by id, ignoring ownership.
pub(crate) fn find_by_id<R: Resource>(conn: &Connection, id: i64) -> DataResult<Option<R>> {
    let sql = format!("{} WHERE id = ?1", select_sql::<R>());
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([id])?;
    match rows.next()? {
        Some(row) => Ok(Some(R::from_row(row)?)),
        None => Ok(None),
    }
}

/// Owner of the stored `R` row, or `None` when the row does not exist.
pub(crate) fn find_owner<R: Resource>(conn: &Connection, id: i64) -> DataResult<Option<UserId>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?1",
        R::ACCESS.owner_column(),
        R::TABLE
    );
    Ok(conn.query_row(&sql, [id], |row| row.get(0)).optional()?)
}

pub(crate) fn delete_row<R: Resource>(conn: &Connection, id: i64) -> DataResult<usize> {
    let sql = format!("DELETE FROM {} WHERE id = ?1", R::TABLE);
    Ok(conn.execute(&sql, [id])?)
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn int_to_bool(row: &Row<'_>, table: &str, column: &str) -> DataResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(DataError::InvalidData(format!(
            "invalid boolean value `{other}` in {table}.{column}"
        ))),
    }
}
