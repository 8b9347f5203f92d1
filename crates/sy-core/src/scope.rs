//! Request-scoped tenant identity slot.
//!
//! Every inbound request runs inside a task-local scope holding the resolved
//! tenant id. Code anywhere below the middleware can read the ambient tenant
//! without parameter threading, and the value survives `.await` suspension
//! within the owning task. Concurrent requests each own their own slot, so no
//! locking is involved and values cannot leak between unrelated requests.
//!
//! The slot is installed with [`with_tenant`] (or [`with_scope`] for an empty
//! slot) and read with [`current`]. Mutation through [`set_current`] /
//! [`clear_current`] is only possible inside an installed scope; outside one
//! it is an explicit [`ScopeError::NoScope`].

use std::cell::RefCell;
use std::future::Future;

use thiserror::Error;
use uuid::Uuid;

tokio::task_local! {
    static CURRENT_TENANT: RefCell<Option<Uuid>>;
}

/// Errors from identity-slot operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ScopeError {
    /// No tenant scope is installed on the current task.
    #[error("no tenant scope is installed on this task")]
    NoScope,
}

/// Runs `fut` inside a fresh, empty tenant scope.
///
/// Used by the request pipeline for bypass paths that carry no tenant, and by
/// tests that need to exercise fail-closed behavior.
pub async fn with_scope<F>(fut: F) -> F::Output
where
    F: Future,
{
    CURRENT_TENANT.scope(RefCell::new(None), fut).await
}

/// Runs `fut` inside a tenant scope pre-populated with `tenant_id`.
///
/// This is the normal entry point: the tenant resolver calls it around the
/// downstream handler once resolution has produced a value, which makes the
/// resolver's write happen-before every read issued by the handler.
pub async fn with_tenant<F>(tenant_id: Uuid, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT_TENANT.scope(RefCell::new(Some(tenant_id)), fut).await
}

/// Returns the ambient tenant id, or `None` when the slot is empty or no
/// scope is installed.
pub fn current() -> Option<Uuid> {
    CURRENT_TENANT.try_with(|cell| *cell.borrow()).ok().flatten()
}

/// Writes `tenant_id` into the current scope's slot.
pub fn set_current(tenant_id: Uuid) -> Result<(), ScopeError> {
    CURRENT_TENANT
        .try_with(|cell| {
            *cell.borrow_mut() = Some(tenant_id);
        })
        .map_err(|_| ScopeError::NoScope)
}

/// Empties the current scope's slot.
///
/// Privileged lookups that must not be narrowed by a stale tenant clear the
/// slot, perform their work, and restore the previous value. Prefer doing
/// such lookups before the slot is ever populated; this exists for callers
/// that cannot reorder.
pub fn clear_current() -> Result<(), ScopeError> {
    CURRENT_TENANT
        .try_with(|cell| {
            *cell.borrow_mut() = None;
        })
        .map_err(|_| ScopeError::NoScope)
}
