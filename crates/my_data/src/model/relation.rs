//! Explicit relation holder.
//!
//! Relations are materialized only by `load_relations` inside an open
//! context. Reading one that was never loaded returns
//! `DataError::DetachedEntity` instead of querying behind the caller's back.

use crate::error::{DataError, DataResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation<T> {
    /// Not loaded; the owning context may already be closed.
    Detached,
    Loaded(T),
}

impl<T> Default for Relation<T> {
    fn default() -> Self {
        Self::Detached
    }
}

impl<T> Relation<T> {
    /// Returns the loaded value, or `DetachedEntity(name)`.
    pub fn get(&self, name: &'static str) -> DataResult<&T> {
        match self {
            Self::Loaded(value) => Ok(value),
            Self::Detached => Err(DataError::DetachedEntity(name)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    pub fn into_loaded(self) -> Option<T> {
        match self {
            Self::Loaded(value) => Some(value),
            Self::Detached => None,
        }
    }
}
