//! Typed retrieve filters and sort keys.
//!
//! # Responsibility
//! - Describe caller predicates as a small expression tree.
//! - Render that tree to a SQL fragment with bound parameters.
//!
//! # Invariants
//! - Column names must belong to the queried entity; anything else is a
//!   `Validation` error, so identifiers are never taken from input verbatim.
//! - Values are always bound, never interpolated.

use crate::error::{DataError, DataResult};
use crate::model::user::UserRole;
use rusqlite::types::Value;

/// Conversion into a bindable SQLite value.
pub trait IntoSqlValue {
    fn into_sql_value(self) -> Value;
}

impl IntoSqlValue for Value {
    fn into_sql_value(self) -> Value {
        self
    }
}

impl IntoSqlValue for &str {
    fn into_sql_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl IntoSqlValue for String {
    fn into_sql_value(self) -> Value {
        Value::Text(self)
    }
}

impl IntoSqlValue for i64 {
    fn into_sql_value(self) -> Value {
        Value::Integer(self)
    }
}

impl IntoSqlValue for i32 {
    fn into_sql_value(self) -> Value {
        Value::Integer(i64::from(self))
    }
}

impl IntoSqlValue for u32 {
    fn into_sql_value(self) -> Value {
        Value::Integer(i64::from(self))
    }
}

impl IntoSqlValue for bool {
    fn into_sql_value(self) -> Value {
        Value::Integer(i64::from(self))
    }
}

impl IntoSqlValue for UserRole {
    fn into_sql_value(self) -> Value {
        Value::Text(self.as_str().to_string())
    }
}

impl<T: IntoSqlValue> IntoSqlValue for Option<T> {
    fn into_sql_value(self) -> Value {
        self.map_or(Value::Null, IntoSqlValue::into_sql_value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Like,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Like => "LIKE",
        }
    }
}

/// Predicate over an entity's columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    IsNull(String),
    NotNull(String),
    InList {
        column: String,
        values: Vec<Value>,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    fn compare(column: impl Into<String>, op: CompareOp, value: impl IntoSqlValue) -> Self {
        Self::Compare {
            column: column.into(),
            op,
            value: value.into_sql_value(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl IntoSqlValue) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    pub fn ne(column: impl Into<String>, value: impl IntoSqlValue) -> Self {
        Self::compare(column, CompareOp::Ne, value)
    }

    pub fn lt(column: impl Into<String>, value: impl IntoSqlValue) -> Self {
        Self::compare(column, CompareOp::Lt, value)
    }

    pub fn gt(column: impl Into<String>, value: impl IntoSqlValue) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::compare(column, CompareOp::Like, pattern.into())
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::IsNull(column.into())
    }

    pub fn not_null(column: impl Into<String>) -> Self {
        Self::NotNull(column.into())
    }

    pub fn in_list<V: IntoSqlValue>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::InList {
            column: column.into(),
            values: values.into_iter().map(IntoSqlValue::into_sql_value).collect(),
        }
    }

    /// All of `filters`. Empty means "match everything".
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    /// Any of `filters`. Empty means "match nothing".
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::Or(filters.into_iter().collect())
    }

    pub fn not(filter: Filter) -> Self {
        Self::Not(Box::new(filter))
    }

    /// Appends this predicate to `sql`, pushing bound values to `params`.
    pub(crate) fn write_sql(
        &self,
        columns: &[&str],
        sql: &mut String,
        params: &mut Vec<Value>,
    ) -> DataResult<()> {
        match self {
            Self::Compare { column, op, value } => {
                let column = checked_column(columns, column)?;
                sql.push_str(&format!("{column} {} ?", op.as_sql()));
                params.push(value.clone());
            }
            Self::IsNull(column) => {
                let column = checked_column(columns, column)?;
                sql.push_str(&format!("{column} IS NULL"));
            }
            Self::NotNull(column) => {
                let column = checked_column(columns, column)?;
                sql.push_str(&format!("{column} IS NOT NULL"));
            }
            Self::InList { column, values } => {
                let column = checked_column(columns, column)?;
                if values.is_empty() {
                    sql.push_str("1 = 0");
                } else {
                    let placeholders = vec!["?"; values.len()].join(", ");
                    sql.push_str(&format!("{column} IN ({placeholders})"));
                    params.extend(values.iter().cloned());
                }
            }
            Self::And(filters) => write_group(filters, " AND ", "1 = 1", columns, sql, params)?,
            Self::Or(filters) => write_group(filters, " OR ", "1 = 0", columns, sql, params)?,
            Self::Not(filter) => {
                sql.push_str("NOT (");
                filter.write_sql(columns, sql, params)?;
                sql.push(')');
            }
        }
        Ok(())
    }
}

fn write_group(
    filters: &[Filter],
    separator: &str,
    empty: &str,
    columns: &[&str],
    sql: &mut String,
    params: &mut Vec<Value>,
) -> DataResult<()> {
    if filters.is_empty() {
        sql.push_str(empty);
        return Ok(());
    }
    sql.push('(');
    for (index, filter) in filters.iter().enumerate() {
        if index > 0 {
            sql.push_str(separator);
        }
        filter.write_sql(columns, sql, params)?;
    }
    sql.push(')');
    Ok(())
}

fn checked_column<'a>(columns: &[&'a str], column: &str) -> DataResult<&'a str> {
    columns
        .iter()
        .copied()
        .find(|known| *known == column)
        .ok_or_else(|| DataError::Validation(format!("unknown column `{column}`")))
}

/// Sort key for retrieve queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub column: String,
    pub descending: bool,
}

impl Sort {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }

    pub(crate) fn write_sql(&self, columns: &[&str], sql: &mut String) -> DataResult<()> {
        let column = checked_column(columns, &self.column)?;
        let direction = if self.descending { "DESC" } else { "ASC" };
        sql.push_str(&format!("{column} {direction}"));
        Ok(())
    }
}

/// Options for `ResourceManager::retrieve`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrieveQuery {
    pub filter: Option<Filter>,
    /// Empty means `id ASC`.
    pub sort: Vec<Sort>,
    /// Zero-based offset.
    pub start: u32,
    pub max_items: Option<u32>,
}

impl RetrieveQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_start(mut self, start: u32) -> Self {
        self.start = start;
        self
    }

    pub fn with_max_items(mut self, max_items: u32) -> Self {
        self.max_items = Some(max_items);
        self
    }
}

impl From<Filter> for RetrieveQuery {
    fn from(filter: Filter) -> Self {
        Self::new().with_filter(filter)
    }
}
