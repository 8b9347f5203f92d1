//! Row isolation for tenant-owned entities.
//!
//! Tenant ownership is declared at compile time: every persisted type whose
//! rows belong to one school implements [`TenantOwned`]. Repositories build
//! their SQL through a [`TenantScope`], which captures the ambient tenant
//! from the identity slot and appends the tenant predicate to every
//! statement. The compiler, not a runtime field scan, decides which types
//! are covered; adding a new tenant-owned entity means implementing the
//! trait and routing its repository through a scope.
//!
//! The scope fails closed: constructing one with an empty identity slot is
//! [`DbError::TenantRequired`], never a fallback tenant. Only the tenant
//! directory itself is read without a scope, and only by the resolver before
//! the slot is installed.
//!
//! Raw queries that bypass a scope are not covered. Tenant-owned tables must
//! not be touched that way.

use uuid::Uuid;

use super::DbError;
use crate::scope;

/// Capability trait for entities whose rows belong to exactly one tenant.
pub trait TenantOwned {
    /// Table the entity is persisted in.
    const TABLE: &'static str;

    /// Column holding the owning tenant id.
    const TENANT_COLUMN: &'static str = "tenant_id";

    /// The owning tenant of this row.
    fn owner(&self) -> Uuid;
}

/// The tenant predicate applied to every statement touching a tenant-owned
/// table.
///
/// Constructed from the ambient identity slot ([`TenantScope::current`]) in
/// request paths, or explicitly ([`TenantScope::for_tenant`]) in provisioning
/// and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantScope {
    tenant_id: Uuid,
}

impl TenantScope {
    /// Captures the ambient tenant. Fails closed when the slot is empty.
    pub fn current() -> Result<Self, DbError> {
        scope::current()
            .map(|tenant_id| Self { tenant_id })
            .ok_or(DbError::TenantRequired)
    }

    /// Builds a scope for an explicit tenant, outside any ambient slot.
    pub fn for_tenant(tenant_id: Uuid) -> Self {
        Self { tenant_id }
    }

    /// The tenant this scope narrows to.
    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    /// Renders the tenant predicate for an entity with the given bind
    /// placeholder (`?` on SQLite, `$n` on PostgreSQL).
    pub fn predicate<E: TenantOwned>(&self, placeholder: &str) -> String {
        format!("{}.{} = {}", E::TABLE, E::TENANT_COLUMN, placeholder)
    }

    /// Checks that a row produced by a query actually belongs to this scope.
    ///
    /// The SQL predicate already guarantees this for scoped statements; the
    /// check guards hand-assembled joins whose projection might slip a
    /// foreign row through.
    pub fn verify<E: TenantOwned>(&self, row: &E) -> Result<(), DbError> {
        if row.owner() == self.tenant_id {
            Ok(())
        } else {
            Err(DbError::TenantMismatch {
                entity: E::TABLE.to_string(),
            })
        }
    }

    /// Checks that an entity about to be written is owned by this scope.
    ///
    /// Writes crossing the boundary are rejected before any SQL runs.
    pub fn verify_write<E: TenantOwned>(&self, entity: &E) -> Result<(), DbError> {
        self.verify(entity)
    }
}
