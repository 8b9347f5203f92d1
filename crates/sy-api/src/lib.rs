//! # sy-api
//!
//! HTTP middleware and request pipeline for the Schoolyard platform: tenant
//! resolution, identity slot installation, branch scoping, and mapping of
//! persistence errors to HTTP responses.

pub mod error;
pub mod middleware;
pub mod pipeline;

pub use error::{ApiError, ErrorResponse};
pub use middleware::{
    BranchScope, BranchScoper, OptionalTenant, RequireTenant, TenantResolutionConfig,
    TenantResolver,
};
pub use pipeline::Pipeline;
