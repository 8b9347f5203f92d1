//! In-memory branch repository for tests.
//!
//! Honors the ambient identity slot exactly like the real implementations:
//! every call captures a [`TenantScope`] and fails closed without one.

use crate::branch::{Branch, BranchAssignment, BranchFacts};
use crate::db::branch_repo::BranchRepository;
use crate::db::isolation::TenantScope;
use crate::db::DbError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Mock [`BranchRepository`] backed by `HashMap`s.
#[derive(Default)]
pub struct MockBranchRepository {
    branches: Mutex<HashMap<Uuid, Branch>>,
    assignments: Mutex<HashMap<Uuid, BranchAssignment>>,
}

impl MockBranchRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the mock with branches and assignments, bypassing scoping.
    pub fn with_data(branches: Vec<Branch>, assignments: Vec<BranchAssignment>) -> Self {
        let repo = Self::new();
        {
            let mut map = repo.branches.lock().unwrap();
            for branch in branches {
                map.insert(branch.id, branch);
            }
        }
        {
            let mut map = repo.assignments.lock().unwrap();
            for assignment in assignments {
                map.insert(assignment.id, assignment);
            }
        }
        repo
    }
}

#[async_trait]
impl BranchRepository for MockBranchRepository {
    async fn create_branch(&self, branch: &Branch) -> Result<Branch, DbError> {
        let scope = TenantScope::current()?;
        scope.verify_write(branch)?;
        self.branches
            .lock()
            .unwrap()
            .insert(branch.id, branch.clone());
        Ok(branch.clone())
    }

    async fn list_branches(&self) -> Result<Vec<Branch>, DbError> {
        let scope = TenantScope::current()?;
        let map = self.branches.lock().unwrap();
        let mut branches: Vec<Branch> = map
            .values()
            .filter(|b| b.tenant_id == scope.tenant_id())
            .cloned()
            .collect();
        branches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(branches)
    }

    async fn get_branch(&self, id: Uuid) -> Result<Option<Branch>, DbError> {
        let scope = TenantScope::current()?;
        Ok(self
            .branches
            .lock()
            .unwrap()
            .get(&id)
            .filter(|b| b.tenant_id == scope.tenant_id())
            .cloned())
    }

    async fn create_assignment(
        &self,
        assignment: &BranchAssignment,
    ) -> Result<BranchAssignment, DbError> {
        let scope = TenantScope::current()?;
        scope.verify_write(assignment)?;
        self.assignments
            .lock()
            .unwrap()
            .insert(assignment.id, assignment.clone());
        Ok(assignment.clone())
    }

    async fn get_assignment(&self, id: Uuid) -> Result<Option<BranchAssignment>, DbError> {
        let scope = TenantScope::current()?;
        Ok(self
            .assignments
            .lock()
            .unwrap()
            .get(&id)
            .filter(|a| a.tenant_id == scope.tenant_id())
            .cloned())
    }

    async fn primary_assignment(&self, user_id: Uuid) -> Result<BranchFacts, DbError> {
        let scope = TenantScope::current()?;
        let assignments = self.assignments.lock().unwrap();
        let primary = assignments
            .values()
            .find(|a| a.tenant_id == scope.tenant_id() && a.user_id == user_id && a.is_primary);

        match primary {
            Some(assignment) => {
                let branches = self.branches.lock().unwrap();
                let branch = branches
                    .get(&assignment.branch_id)
                    .filter(|b| b.tenant_id == scope.tenant_id())
                    .ok_or_else(|| DbError::not_found("Branch", assignment.branch_id))?;
                Ok(BranchFacts::from_assignment(assignment, branch))
            }
            None => Ok(BranchFacts::unassigned()),
        }
    }

    async fn update_assignment(
        &self,
        assignment: &BranchAssignment,
    ) -> Result<BranchAssignment, DbError> {
        let scope = TenantScope::current()?;
        scope.verify_write(assignment)?;
        let mut map = self.assignments.lock().unwrap();
        let stored = map
            .get_mut(&assignment.id)
            .filter(|a| a.tenant_id == scope.tenant_id())
            .ok_or_else(|| DbError::not_found("BranchAssignment", assignment.id))?;

        if stored.version != assignment.version {
            return Err(DbError::conflict("BranchAssignment", assignment.id));
        }

        stored.branch_id = assignment.branch_id;
        stored.role = assignment.role;
        stored.is_primary = assignment.is_primary;
        stored.version += 1;
        stored.updated_at = chrono::Utc::now();
        Ok(stored.clone())
    }

    async fn reload_assignment(&self, id: Uuid) -> Result<BranchAssignment, DbError> {
        self.get_assignment(id)
            .await?
            .ok_or_else(|| DbError::not_found("BranchAssignment", id))
    }

    async fn delete_assignment(&self, id: Uuid) -> Result<bool, DbError> {
        let scope = TenantScope::current()?;
        let mut map = self.assignments.lock().unwrap();
        let owned = map
            .get(&id)
            .map(|a| a.tenant_id == scope.tenant_id())
            .unwrap_or(false);
        if owned {
            map.remove(&id);
        }
        Ok(owned)
    }
}
