//! Domain model for accounts, API access and user-owned data.
//!
//! # Responsibility
//! - Define the records persisted by core and their validation rules.
//! - Model relations explicitly as loaded-or-detached values.
//!
//! # Invariants
//! - Every persisted record is identified by an integer `id`.
//! - Every user-scoped record carries the owning `user_id`.
//! - Relations are never loaded implicitly.

pub mod api;
pub mod relation;
pub mod tag;
pub mod user;
pub mod user_setting;
