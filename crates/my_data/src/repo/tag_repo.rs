//! Tag persistence.

use super::{AccessRule, Resource};
use crate::error::DataResult;
use crate::model::tag::Tag;
use crate::model::user::UserId;
use rusqlite::{params, Connection, Row};

impl Resource for Tag {
    const KIND: &'static str = "tag";
    const TABLE: &'static str = "tags";
    const COLUMNS: &'static [&'static str] = &["id", "user_id", "title"];
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
        Tag::validate(self)
    }

    fn normalize(&mut self) {
        let trimmed = self.title.trim();
        if trimmed.len() != self.title.len() {
            self.title = trimmed.to_string();
        }
    }

    fn from_row(row: &Row<'_>) -> DataResult<Self> {
        Ok(Self {
            id: Some(row.get("id")?),
            user_id: Some(row.get("user_id")?),
            title: row.get("title")?,
        })
    }

    fn insert(&self, conn: &Connection) -> DataResult<i64> {
        self.validate()?;
        conn.execute(
            "INSERT INTO tags (id, user_id, title) VALUES (?1, ?2, ?3);",
            params![self.id, self.user_id, self.title],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update(&self, conn: &Connection) -> DataResult<usize> {
        self.validate()?;
        Ok(conn.execute(
            "UPDATE tags SET title = ?1 WHERE id = ?2;",
            params![self.title, self.id],
        )?)
    }
}
