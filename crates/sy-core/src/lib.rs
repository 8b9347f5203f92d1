//! Core domain types and persistence for the Schoolyard platform.
//!
//! This crate carries the tenant-isolation and resilient-persistence
//! machinery every feature module builds on:
//!
//! - [`scope`]: the per-task identity slot holding the active tenant.
//! - [`tenant`]: the tenant directory model (status lifecycle, settings).
//! - [`branch`]: branches (campuses) and principal-to-branch assignments.
//! - [`auth`]: the authenticated principal.
//! - [`db`]: pools, transactions, row isolation, and the retry executor.
//!
//! The invariant the whole crate is organized around: no query against a
//! tenant-owned table runs without a tenant. An empty identity slot is an
//! error, never a default.

pub mod auth;
pub mod branch;
pub mod db;
pub mod scope;
pub mod tenant;

pub use auth::Principal;
pub use branch::{Branch, BranchAssignment, BranchFacts, BranchRole};
pub use db::{DbError, DbPool, TenantOwned, TenantScope};
pub use scope::{current as current_tenant, with_scope, with_tenant};
pub use tenant::{Tenant, TenantContext, TenantError, TenantSettings, TenantStatus};
