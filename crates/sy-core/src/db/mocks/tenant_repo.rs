//! In-memory tenant repository for tests.

use crate::db::tenant_repo::{TenantRepository, TenantUpdate};
use crate::db::DbError;
use crate::tenant::{Tenant, TenantStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Mock [`TenantRepository`] backed by a `HashMap`.
#[derive(Default)]
pub struct MockTenantRepository {
    tenants: Mutex<HashMap<Uuid, Tenant>>,
    /// When set, every call fails with this error (for failure-path tests).
    fail_with: Mutex<Option<DbError>>,
}

impl MockTenantRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the mock with tenants.
    pub fn with_tenants(tenants: Vec<Tenant>) -> Self {
        let repo = Self::new();
        {
            let mut map = repo.tenants.lock().unwrap();
            for tenant in tenants {
                map.insert(tenant.id, tenant);
            }
        }
        repo
    }

    /// Makes every subsequent call fail with the given error.
    pub fn fail_with(&self, error: DbError) {
        *self.fail_with.lock().unwrap() = Some(error);
    }

    fn check_failure(&self) -> Result<(), DbError> {
        let guard = self.fail_with.lock().unwrap();
        match &*guard {
            Some(DbError::Connection(msg)) => Err(DbError::Connection(msg.clone())),
            Some(DbError::Query(msg)) => Err(DbError::Query(msg.clone())),
            Some(err) => Err(DbError::Query(err.to_string())),
            None => Ok(()),
        }
    }

    /// Number of stored tenants.
    pub fn len(&self) -> usize {
        self.tenants.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TenantRepository for MockTenantRepository {
    async fn create(&self, tenant: &Tenant) -> Result<Tenant, DbError> {
        self.check_failure()?;
        let mut map = self.tenants.lock().unwrap();
        if map.values().any(|t| t.code == tenant.code) {
            return Err(DbError::Constraint {
                kind: crate::db::ConstraintKind::Unique,
                message: format!("tenant code '{}' already exists", tenant.code),
            });
        }
        map.insert(tenant.id, tenant.clone());
        Ok(tenant.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Tenant>, DbError> {
        self.check_failure()?;
        Ok(self.tenants.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Tenant>, DbError> {
        self.check_failure()?;
        Ok(self
            .tenants
            .lock()
            .unwrap()
            .values()
            .find(|t| t.code == code)
            .cloned())
    }

    async fn list(&self, status: Option<TenantStatus>) -> Result<Vec<Tenant>, DbError> {
        self.check_failure()?;
        let map = self.tenants.lock().unwrap();
        let mut tenants: Vec<Tenant> = map
            .values()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        tenants.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tenants)
    }

    async fn update(&self, id: Uuid, update: &TenantUpdate) -> Result<Tenant, DbError> {
        self.check_failure()?;
        let mut map = self.tenants.lock().unwrap();
        let tenant = map
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found("Tenant", id))?;
        if let Some(name) = &update.name {
            tenant.name = name.clone();
        }
        if let Some(status) = update.status {
            tenant.status = status;
        }
        if let Some(settings) = &update.settings {
            tenant.settings = settings.clone();
        }
        tenant.updated_at = chrono::Utc::now();
        Ok(tenant.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        self.check_failure()?;
        Ok(self.tenants.lock().unwrap().remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_lookup_by_code() {
        let repo = MockTenantRepository::new();
        let tenant = Tenant::new("hilltop", "Hilltop Academy").unwrap();
        repo.create(&tenant).await.unwrap();

        let found = repo.get_by_code("hilltop").await.unwrap().unwrap();
        assert_eq!(found.id, tenant.id);
        assert!(repo.get_by_code("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_code_is_a_unique_violation() {
        let repo = MockTenantRepository::new();
        repo.create(&Tenant::new("shared", "A").unwrap()).await.unwrap();
        let err = repo
            .create(&Tenant::new("shared", "B").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Constraint { .. }));
    }

    #[tokio::test]
    async fn injected_failures_surface() {
        let repo = MockTenantRepository::new();
        repo.fail_with(DbError::Connection("down".to_string()));
        assert!(repo.get(Uuid::new_v4()).await.is_err());
    }
}
