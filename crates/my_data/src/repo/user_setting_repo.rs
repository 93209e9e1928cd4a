//! User setting persistence.

use super::{AccessRule, Resource};
use crate::error::DataResult;
use crate::model::user::UserId;
use crate::model::user_setting::UserSetting;
use rusqlite::{params, Connection, Row};

impl Resource for UserSetting {
    const KIND: &'static str = "user_setting";
    const TABLE: &'static str = "user_settings";
    const COLUMNS: &'static [&'static str] = &["id", "user_id", "setting", "value"];
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
        UserSetting::validate(self)
    }

    fn from_row(row: &Row<'_>) -> DataResult<Self> {
        Ok(Self {
            id: Some(row.get("id")?),
            user_id: Some(row.get("user_id")?),
            setting: row.get("setting")?,
            value: row.get("value")?,
        })
    }

    fn insert(&self, conn: &Connection) -> DataResult<i64> {
        self.validate()?;
        conn.execute(
            "INSERT INTO user_settings (id, user_id, setting, value) VALUES (?1, ?2, ?3, ?4);",
            params![
                self.id,
                self.user_id,
                self.setting.as_str(),
                self.value.as_str()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update(&self, conn: &Connection) -> DataResult<usize> {
        self.validate()?;
        Ok(conn.execute(
            "UPDATE user_settings SET setting = ?1, value = ?2 WHERE id = ?3;",
            params![self.setting.as_str(), self.value.as_str(), self.id],
        )?)
    }
}
