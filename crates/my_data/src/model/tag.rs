//! Tag model.

use crate::error::{DataError, DataResult};
use crate::model::user::UserId;
use serde::{Deserialize, Serialize};

pub type TagId = i64;

const TAG_TITLE_MAX_CHARS: usize = 64;

/// User-owned label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub id: Option<TagId>,
    /// Stamped from the context principal on create; input values are ignored.
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub title: String,
}

impl Tag {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            user_id: None,
            title: title.into(),
        }
    }

    pub fn validate(&self) -> DataResult<()> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(DataError::Validation("tag title must not be empty".to_string()));
        }
        if title.chars().count() > TAG_TITLE_MAX_CHARS {
            return Err(DataError::Validation(format!(
                "tag title must be at most {TAG_TITLE_MAX_CHARS} characters"
            )));
        }
        Ok(())
    }
}
