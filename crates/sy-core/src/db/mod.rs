//! Persistence layer: pools, transactions, row isolation, and the resilient
//! executor.
//!
//! Everything that touches a tenant-owned table goes through a
//! [`TenantScope`]; everything that can fail transiently goes through
//! [`run_with_retry`] or [`run_with_recovery`].

mod error;
pub mod isolation;
mod pool;
pub mod retry;
pub mod schema;

pub mod branch_repo;
pub mod tenant_repo;

#[cfg(feature = "database")]
mod transaction;

pub mod mocks;

pub use error::{ConstraintKind, DbError};
pub use isolation::{TenantOwned, TenantScope};
pub use pool::{create_pool, create_pool_with_options, DbPool, PoolOptions};
pub use retry::{
    classify, run_with_recovery, run_with_retry, ErrorClass, Retried, RetryConfig,
};
pub use schema::run_migrations;

pub use branch_repo::BranchRepository;
pub use tenant_repo::{TenantRepository, TenantUpdate};

#[cfg(feature = "database")]
pub use branch_repo::{create_branch_repository, PgBranchRepository, SqliteBranchRepository};
#[cfg(feature = "database")]
pub use tenant_repo::{create_tenant_repository, PgTenantRepository, SqliteTenantRepository};
#[cfg(feature = "database")]
pub use transaction::{run_in_transaction, DbTransaction};
