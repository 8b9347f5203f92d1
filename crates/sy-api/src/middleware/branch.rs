//! Branch scoping middleware.
//!
//! Runs after tenant resolution, inside the identity slot. For each
//! authenticated request it loads the principal's primary branch assignment
//! within the resolved tenant and attaches [`BranchFacts`] to the request.
//! Branch scoping is advisory: handlers that care consume the facts, nothing
//! narrows queries by branch automatically, and a principal without an
//! assignment proceeds with explicit `Unassigned` facts rather than being
//! rejected.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use sy_core::{
    auth::Principal,
    branch::BranchFacts,
    db::BranchRepository,
    tenant::TenantContext,
};
use tracing::{debug, warn};

/// Loads branch facts for the authenticated principal.
#[derive(Clone)]
pub struct BranchScoper {
    repo: Arc<dyn BranchRepository>,
}

impl BranchScoper {
    /// Creates a new branch scoper.
    pub fn new(repo: Arc<dyn BranchRepository>) -> Self {
        Self { repo }
    }

    /// Resolves branch facts for a principal in the ambient tenant.
    ///
    /// Must be called inside an installed identity slot; the repository
    /// fails closed otherwise.
    pub async fn facts_for(&self, principal: &Principal) -> Result<BranchFacts, Response> {
        self.repo
            .primary_assignment(principal.user_id)
            .await
            .map_err(|e| {
                warn!(user_id = %principal.user_id, error = %e, "Branch fact lookup failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            })
    }
}

/// Axum extractor for request-scoped branch facts.
///
/// Rejects with 500 when the branch scoper did not run for this request;
/// that is a pipeline-ordering bug, not a client error.
pub struct BranchScope(pub BranchFacts);

#[async_trait]
impl<S> FromRequestParts<S> for BranchScope
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<BranchFacts>()
            .cloned()
            .map(BranchScope)
            .ok_or((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Branch scope not established",
            ))
    }
}

/// Middleware that attaches branch facts to authenticated, tenant-resolved
/// requests.
///
/// Requests without a principal or without a resolved tenant pass through
/// untouched; they have no assignment to look up.
pub async fn branch_scoping_middleware(
    scoper: BranchScoper,
    mut request: Request,
    next: Next,
) -> Response {
    let principal = request.extensions().get::<Principal>().cloned();
    let has_tenant = request.extensions().get::<TenantContext>().is_some();

    if let (Some(principal), true) = (principal, has_tenant) {
        let facts = match scoper.facts_for(&principal).await {
            Ok(facts) => facts,
            Err(response) => return response,
        };

        debug!(
            user_id = %principal.user_id,
            branch_id = ?facts.branch_id,
            role = %facts.role,
            assigned = facts.is_assigned(),
            "Branch scope established"
        );
        request.extensions_mut().insert(facts);
    }

    next.run(request).await
}
