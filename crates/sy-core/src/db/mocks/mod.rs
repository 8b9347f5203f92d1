//! In-memory repository implementations for tests.

mod branch_repo;
mod tenant_repo;

pub use branch_repo::MockBranchRepository;
pub use tenant_repo::MockTenantRepository;
