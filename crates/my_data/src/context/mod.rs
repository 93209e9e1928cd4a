//! Scoped transactional handles bound to an authenticated principal.
//!
//! # Responsibility
//! - Open one connection and one transaction per context.
//! - Bind resource managers to the context's principal.
//!
//! # Invariants
//! - A context commits only when asked; every other exit rolls back.
//! - The principal's role is read from storage when the context opens,
//!   never trusted from the caller's `User` value.
//! - Service principals never receive a `UserContext`.

mod manager;
mod service_context;
mod session;
mod user_context;

pub use manager::{scope_filter, ResourceManager};
pub use service_context::ServiceContext;
pub use user_context::UserContext;

use crate::error::{DataError, DataResult};
use crate::model::user::{User, UserId, UserRole};

/// Identity a context acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub username: String,
    pub role: UserRole,
}

impl Principal {
    /// Principal of a persisted user.
    pub fn from_user(user: &User) -> DataResult<Self> {
        let id = user.id.ok_or_else(|| {
            DataError::PermissionDenied(format!("user `{}` is not persisted", user.username))
        })?;
        Ok(Self {
            id,
            username: user.username.clone(),
            role: user.role,
        })
    }

    pub fn is_root(&self) -> bool {
        self.role == UserRole::Root
    }
}
