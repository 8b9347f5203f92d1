//! Request pipeline assembly.
//!
//! Layer ordering is load-bearing: the tenant must be resolved (and the
//! identity slot installed) before the branch scoper runs, because the
//! scoper's repository reads fail closed without an ambient tenant. Axum
//! applies layers bottom-up, so the tenant layer is added after the branch
//! layer here.

use axum::{extract::Request, middleware, middleware::Next, Router};
use std::sync::Arc;
use sy_core::db::{BranchRepository, TenantRepository};

use crate::middleware::{
    branch_scoping_middleware, cors_layer, request_body_limit_layer, request_id, request_logging,
    tenant_resolution_middleware, BranchScoper, TenantResolutionConfig, TenantResolver,
};

/// Handles to the stateful pipeline components, for cache invalidation and
/// tests.
#[derive(Clone)]
pub struct Pipeline {
    /// The tenant resolver, shared with the admin API for cache
    /// invalidation on tenant updates.
    pub resolver: TenantResolver,
    /// The branch scoper.
    pub scoper: BranchScoper,
}

impl Pipeline {
    /// Builds the pipeline components from repositories.
    pub fn new(
        tenant_repo: Arc<dyn TenantRepository>,
        branch_repo: Arc<dyn BranchRepository>,
        config: TenantResolutionConfig,
    ) -> Self {
        Self {
            resolver: TenantResolver::new(tenant_repo, config),
            scoper: BranchScoper::new(branch_repo),
        }
    }

    /// Applies the full middleware stack to a router.
    ///
    /// Request flow: request id, logging, tenant resolution (slot install),
    /// branch scoping, then the handler. CORS and the body limit wrap the
    /// outside.
    pub fn apply(&self, router: Router) -> Router {
        let resolver = self.resolver.clone();
        let scoper = self.scoper.clone();

        router
            .layer(middleware::from_fn(move |request: Request, next: Next| {
                let scoper = scoper.clone();
                async move { branch_scoping_middleware(scoper, request, next).await }
            }))
            .layer(middleware::from_fn(move |request: Request, next: Next| {
                let resolver = resolver.clone();
                async move { tenant_resolution_middleware(resolver, request, next).await }
            }))
            .layer(middleware::from_fn(request_logging))
            .layer(middleware::from_fn(request_id))
            .layer(request_body_limit_layer())
            .layer(cors_layer())
    }
}
