//! User setting model.

use crate::error::{DataError, DataResult};
use crate::model::user::UserId;
use serde::{Deserialize, Serialize};

pub type UserSettingId = i64;

/// One key/value preference owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSetting {
    #[serde(default)]
    pub id: Option<UserSettingId>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub setting: String,
    pub value: String,
}

impl UserSetting {
    pub fn new(setting: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: None,
            user_id: None,
            setting: setting.into(),
            value: value.into(),
        }
    }

    pub fn validate(&self) -> DataResult<()> {
        if self.setting.trim().is_empty() {
            return Err(DataError::Validation(
                "user setting name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
