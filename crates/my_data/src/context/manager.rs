//! Ownership-enforcing CRUD over one entity type.
//!
//! # Responsibility
//! - Authorize each operation against the context principal.
//! - Scope reads to rows the principal owns and check ownership on writes.
//!
//! # Invariants
//! - Root bypasses ownership in exactly one place: `scope_filter`.
//! - User-scoped rows are created with `user_id` set to the principal.
//! - Only root creates or deletes user accounts; root never deletes itself.
//! - Nothing is committed here; the owning context decides.

use super::Principal;
use crate::error::{DataError, DataResult};
use crate::model::api::{ApiScope, ApiToken};
use crate::model::user::{UserId, UserRole};
use crate::repo::api_repo::{find_scope, link_token_scope};
use crate::repo::filter::{Filter, RetrieveQuery};
use crate::repo::{count_rows, delete_row, find_by_id, find_owner, query_rows, AccessRule, Resource};
use log::{debug, info, warn};
use rusqlite::Connection;
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Create,
    Retrieve,
    Update,
    Delete,
}

impl Operation {
    fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Retrieve => "retrieve",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Ownership predicate for `principal` on rows governed by `rule`.
///
/// Root gets `None`, which means every row.
pub fn scope_filter(principal: &Principal, rule: AccessRule) -> Option<Filter> {
    if principal.is_root() {
        return None;
    }
    Some(Filter::eq(rule.owner_column(), principal.id))
}

fn authorize_operation<R: Resource>(principal: &Principal, operation: Operation) -> DataResult<()> {
    let allowed = match (principal.role, R::ACCESS, operation) {
        (UserRole::Service, _, _) => false,
        (UserRole::Root, _, _) => true,
        (UserRole::Normal, AccessRule::UserAccount, Operation::Create | Operation::Delete) => {
            false
        }
        (UserRole::Normal, _, _) => true,
    };
    if allowed {
        return Ok(());
    }
    warn!(
        "event=resource_{} module=context status=denied kind={} principal_id={} reason=role",
        operation.as_str(),
        R::KIND,
        principal.id
    );
    Err(DataError::PermissionDenied(format!(
        "{} may not {} {}",
        principal.role.as_str(),
        operation.as_str(),
        R::KIND
    )))
}

/// CRUD handle for `R`, borrowed from an open `UserContext`.
pub struct ResourceManager<'ctx, R> {
    conn: &'ctx Connection,
    principal: &'ctx Principal,
    _resource: PhantomData<R>,
}

impl<'ctx, R: Resource> ResourceManager<'ctx, R> {
    pub(crate) fn new(conn: &'ctx Connection, principal: &'ctx Principal) -> Self {
        Self {
            conn,
            principal,
            _resource: PhantomData,
        }
    }

    /// Persists `entities` and returns them with their ids.
    ///
    /// # Errors
    /// - `PermissionDenied` when the principal may not create `R`.
    /// - `Validation` for invalid entities or unique/constraint violations.
    pub fn create(&self, entities: Vec<R>) -> DataResult<Vec<R>> {
        authorize_operation::<R>(self.principal, Operation::Create)?;

        let mut created = Vec::with_capacity(entities.len());
        for mut entity in entities {
            if R::ACCESS == AccessRule::UserScoped {
                entity.stamp_owner(self.principal.id);
            }
            entity.normalize();
            let id = entity.insert(self.conn)?;
            entity.set_id(id);
            created.push(entity);
        }

        info!(
            "event=resource_create module=context status=ok kind={} count={} principal_id={}",
            R::KIND,
            created.len(),
            self.principal.id
        );
        Ok(created)
    }

    pub fn create_one(&self, entity: R) -> DataResult<R> {
        let mut created = self.create(vec![entity])?;
        created
            .pop()
            .ok_or_else(|| DataError::InvalidData(format!("{} create returned nothing", R::KIND)))
    }

    /// Rows visible to the principal that match `query`.
    pub fn retrieve(&self, query: &RetrieveQuery) -> DataResult<Vec<R>> {
        authorize_operation::<R>(self.principal, Operation::Retrieve)?;
        let filter = self.visible(query.filter.clone());
        let items = query_rows::<R>(
            self.conn,
            filter.as_ref(),
            &query.sort,
            query.start,
            query.max_items,
        )?;
        debug!(
            "event=resource_retrieve module=context status=ok kind={} count={} principal_id={}",
            R::KIND,
            items.len(),
            self.principal.id
        );
        Ok(items)
    }

    /// Every visible row, ordered by id.
    pub fn retrieve_all(&self) -> DataResult<Vec<R>> {
        self.retrieve(&RetrieveQuery::new())
    }

    /// Visible row with `id`, if any.
    pub fn get(&self, id: i64) -> DataResult<Option<R>> {
        let query = RetrieveQuery::from(Filter::eq("id", id)).with_max_items(1);
        Ok(self.retrieve(&query)?.into_iter().next())
    }

    /// Number of visible rows matching `filter`.
    pub fn count(&self, filter: Option<&Filter>) -> DataResult<u64> {
        authorize_operation::<R>(self.principal, Operation::Retrieve)?;
        let filter = self.visible(filter.cloned());
        count_rows::<R>(self.conn, filter.as_ref())
    }

    /// Rewrites the stored rows of `entities`.
    ///
    /// Owner columns keep their stored value; the returned entities carry it.
    ///
    /// # Errors
    /// - `NotFound` when a row no longer exists.
    /// - `PermissionDenied` when a row belongs to another user.
    pub fn update(&self, entities: Vec<R>) -> DataResult<Vec<R>> {
        authorize_operation::<R>(self.principal, Operation::Update)?;

        let mut updated = Vec::with_capacity(entities.len());
        for mut entity in entities {
            let id = self.require_id(&entity)?;
            let stored = find_by_id::<R>(self.conn, id)?
                .ok_or_else(|| DataError::not_found(R::KIND, id))?;
            self.check_row_access(Operation::Update, id, stored.owner_id())?;
            entity.guard_update(&stored, self.principal)?;

            entity.normalize();
            if entity.update(self.conn)? == 0 {
                return Err(DataError::not_found(R::KIND, id));
            }
            if let Some(owner) = stored.owner_id() {
                entity.stamp_owner(owner);
            }
            updated.push(entity);
        }

        info!(
            "event=resource_update module=context status=ok kind={} count={} principal_id={}",
            R::KIND,
            updated.len(),
            self.principal.id
        );
        Ok(updated)
    }

    pub fn update_one(&self, entity: R) -> DataResult<R> {
        let mut updated = self.update(vec![entity])?;
        updated
            .pop()
            .ok_or_else(|| DataError::InvalidData(format!("{} update returned nothing", R::KIND)))
    }

    /// Deletes the stored rows of `entities`. Owned rows cascade.
    ///
    /// # Errors
    /// - `NotFound` when a row no longer exists.
    /// - `PermissionDenied` for foreign rows, or when root deletes itself.
    pub fn delete(&self, entities: &[R]) -> DataResult<()> {
        authorize_operation::<R>(self.principal, Operation::Delete)?;

        for entity in entities {
            let id = self.require_id(entity)?;
            let owner = self.stored_owner(id)?;
            self.check_row_access(Operation::Delete, id, Some(owner))?;
            if R::ACCESS == AccessRule::UserAccount && id == self.principal.id {
                warn!(
                    "event=resource_delete module=context status=denied kind={} principal_id={} reason=self_delete",
                    R::KIND,
                    self.principal.id
                );
                return Err(DataError::PermissionDenied(format!(
                    "user `{}` may not delete itself",
                    self.principal.username
                )));
            }
            delete_row::<R>(self.conn, id)?;
        }

        info!(
            "event=resource_delete module=context status=ok kind={} count={} principal_id={}",
            R::KIND,
            entities.len(),
            self.principal.id
        );
        Ok(())
    }

    pub fn delete_one(&self, entity: &R) -> DataResult<()> {
        self.delete(std::slice::from_ref(entity))
    }

    /// Materializes the relations of a visible `entity`.
    pub fn load_relations(&self, entity: &mut R) -> DataResult<()> {
        authorize_operation::<R>(self.principal, Operation::Retrieve)?;
        let id = self.require_id(entity)?;
        let owner = self.stored_owner(id)?;
        self.check_row_access(Operation::Retrieve, id, Some(owner))?;
        entity.load_relations(self.conn)
    }

    fn visible(&self, filter: Option<Filter>) -> Option<Filter> {
        match (scope_filter(self.principal, R::ACCESS), filter) {
            (Some(scope), Some(filter)) => Some(Filter::and([scope, filter])),
            (scope, filter) => scope.or(filter),
        }
    }

    fn require_id(&self, entity: &R) -> DataResult<i64> {
        entity
            .id()
            .ok_or_else(|| DataError::Validation(format!("{} has no id", R::KIND)))
    }

    fn stored_owner(&self, id: i64) -> DataResult<UserId> {
        find_owner::<R>(self.conn, id)?.ok_or_else(|| DataError::not_found(R::KIND, id))
    }

    fn check_row_access(
        &self,
        operation: Operation,
        id: i64,
        owner: Option<UserId>,
    ) -> DataResult<()> {
        if scope_filter(self.principal, R::ACCESS).is_none() || owner == Some(self.principal.id) {
            return Ok(());
        }
        warn!(
            "event=resource_{} module=context status=denied kind={} id={} principal_id={} reason=not_owner",
            operation.as_str(),
            R::KIND,
            id,
            self.principal.id
        );
        Err(DataError::PermissionDenied(format!(
            "{} {} is not owned by `{}`",
            R::KIND,
            id,
            self.principal.username
        )))
    }
}

impl ResourceManager<'_, ApiToken> {
    /// Links the named scopes (`module.subject`) to `token`.
    ///
    /// # Errors
    /// - `NotFound` for an unknown token or scope.
    /// - `PermissionDenied` when the token belongs to another user.
    /// - `Validation` when a scope is already linked.
    pub fn assign_scopes(&self, token: &ApiToken, scopes: &[&str]) -> DataResult<()> {
        authorize_operation::<ApiToken>(self.principal, Operation::Update)?;
        let token_id = self.require_id(token)?;
        let owner = self.stored_owner(token_id)?;
        self.check_row_access(Operation::Update, token_id, Some(owner))?;

        for name in scopes {
            let wanted = ApiScope::parse(name)?;
            let scope_id = find_scope(self.conn, &wanted.module, &wanted.subject)?
                .and_then(|scope| scope.id)
                .ok_or_else(|| DataError::not_found("api_scope", name))?;
            link_token_scope(self.conn, None, token_id, scope_id)?;
        }

        info!(
            "event=token_scopes_assign module=context status=ok token_id={} count={} principal_id={}",
            token_id,
            scopes.len(),
            self.principal.id
        );
        Ok(())
    }
}
