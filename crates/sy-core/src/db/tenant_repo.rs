//! Tenant directory repository.
//!
//! The tenant table is the lookup table resolution itself reads, so it is
//! deliberately not routed through a [`crate::db::TenantScope`]: the resolver
//! queries it before any identity slot is installed for the request. No other
//! repository may follow this pattern.

use super::{DbError, DbPool};
use crate::tenant::{Tenant, TenantSettings, TenantStatus};
use async_trait::async_trait;
use uuid::Uuid;

/// Partial update for a tenant record.
#[derive(Debug, Clone, Default)]
pub struct TenantUpdate {
    /// New display name.
    pub name: Option<String>,
    /// New lifecycle status.
    pub status: Option<TenantStatus>,
    /// New settings blob.
    pub settings: Option<TenantSettings>,
}

/// Repository trait for the tenant directory.
#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Creates a new tenant (provisioning).
    async fn create(&self, tenant: &Tenant) -> Result<Tenant, DbError>;

    /// Gets a tenant by id.
    async fn get(&self, id: Uuid) -> Result<Option<Tenant>, DbError>;

    /// Gets a tenant by its subdomain code.
    async fn get_by_code(&self, code: &str) -> Result<Option<Tenant>, DbError>;

    /// Lists tenants, optionally filtered by status.
    async fn list(&self, status: Option<TenantStatus>) -> Result<Vec<Tenant>, DbError>;

    /// Applies a partial update.
    async fn update(&self, id: Uuid, update: &TenantUpdate) -> Result<Tenant, DbError>;

    /// Deletes a tenant. Returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, DbError>;
}

/// SQLite implementation of [`TenantRepository`].
#[cfg(feature = "database")]
pub struct SqliteTenantRepository {
    pool: sqlx::SqlitePool,
}

#[cfg(feature = "database")]
impl SqliteTenantRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl TenantRepository for SqliteTenantRepository {
    async fn create(&self, tenant: &Tenant) -> Result<Tenant, DbError> {
        let settings = serde_json::to_string(&tenant.settings)?;

        sqlx::query(
            r#"
            INSERT INTO tenants (id, name, code, status, settings, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tenant.id.to_string())
        .bind(&tenant.name)
        .bind(&tenant.code)
        .bind(tenant.status.as_db_str())
        .bind(&settings)
        .bind(tenant.created_at.to_rfc3339())
        .bind(tenant.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(tenant.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Tenant>, DbError> {
        let row: Option<SqliteTenantRow> = sqlx::query_as(
            "SELECT id, name, code, status, settings, created_at, updated_at FROM tenants WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Tenant>, DbError> {
        let row: Option<SqliteTenantRow> = sqlx::query_as(
            "SELECT id, name, code, status, settings, created_at, updated_at FROM tenants WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, status: Option<TenantStatus>) -> Result<Vec<Tenant>, DbError> {
        let rows: Vec<SqliteTenantRow> = match status {
            Some(status) => {
                sqlx::query_as(
                    "SELECT id, name, code, status, settings, created_at, updated_at FROM tenants WHERE status = ? ORDER BY name ASC",
                )
                .bind(status.as_db_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT id, name, code, status, settings, created_at, updated_at FROM tenants ORDER BY name ASC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update(&self, id: Uuid, update: &TenantUpdate) -> Result<Tenant, DbError> {
        let existing = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Tenant", id))?;

        let name = update.name.as_ref().unwrap_or(&existing.name);
        let status = update.status.unwrap_or(existing.status);
        let settings = update.settings.as_ref().unwrap_or(&existing.settings);
        let settings_json = serde_json::to_string(settings)?;

        sqlx::query(
            "UPDATE tenants SET name = ?, status = ?, settings = ?, updated_at = ? WHERE id = ?",
        )
        .bind(name)
        .bind(status.as_db_str())
        .bind(&settings_json)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Tenant", id))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM tenants WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// PostgreSQL implementation of [`TenantRepository`].
#[cfg(feature = "database")]
pub struct PgTenantRepository {
    pool: sqlx::PgPool,
}

#[cfg(feature = "database")]
impl PgTenantRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl TenantRepository for PgTenantRepository {
    async fn create(&self, tenant: &Tenant) -> Result<Tenant, DbError> {
        let settings = serde_json::to_value(&tenant.settings)?;

        sqlx::query(
            r#"
            INSERT INTO tenants (id, name, code, status, settings, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.code)
        .bind(tenant.status.as_db_str())
        .bind(&settings)
        .bind(tenant.created_at)
        .bind(tenant.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(tenant.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Tenant>, DbError> {
        let row: Option<PgTenantRow> = sqlx::query_as(
            "SELECT id, name, code, status, settings, created_at, updated_at FROM tenants WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Tenant>, DbError> {
        let row: Option<PgTenantRow> = sqlx::query_as(
            "SELECT id, name, code, status, settings, created_at, updated_at FROM tenants WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, status: Option<TenantStatus>) -> Result<Vec<Tenant>, DbError> {
        let rows: Vec<PgTenantRow> = match status {
            Some(status) => {
                sqlx::query_as(
                    "SELECT id, name, code, status, settings, created_at, updated_at FROM tenants WHERE status = $1 ORDER BY name ASC",
                )
                .bind(status.as_db_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT id, name, code, status, settings, created_at, updated_at FROM tenants ORDER BY name ASC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update(&self, id: Uuid, update: &TenantUpdate) -> Result<Tenant, DbError> {
        let existing = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Tenant", id))?;

        let name = update.name.as_ref().unwrap_or(&existing.name);
        let status = update.status.unwrap_or(existing.status);
        let settings = update.settings.as_ref().unwrap_or(&existing.settings);
        let settings_json = serde_json::to_value(settings)?;

        sqlx::query(
            "UPDATE tenants SET name = $1, status = $2, settings = $3, updated_at = NOW() WHERE id = $4",
        )
        .bind(name)
        .bind(status.as_db_str())
        .bind(&settings_json)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Tenant", id))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Creates the repository matching the pool's backend.
#[cfg(feature = "database")]
pub fn create_tenant_repository(pool: &DbPool) -> Box<dyn TenantRepository> {
    match pool {
        DbPool::Sqlite(pool) => Box::new(SqliteTenantRepository::new(pool.clone())),
        DbPool::Postgres(pool) => Box::new(PgTenantRepository::new(pool.clone())),
    }
}

// Row mapping helpers.

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct SqliteTenantRow {
    id: String,
    name: String,
    code: String,
    status: String,
    settings: String,
    created_at: String,
    updated_at: String,
}

#[cfg(feature = "database")]
impl TryFrom<SqliteTenantRow> for Tenant {
    type Error = DbError;

    fn try_from(row: SqliteTenantRow) -> Result<Self, Self::Error> {
        use chrono::{DateTime, Utc};

        let id = Uuid::parse_str(&row.id)
            .map_err(|e| DbError::Serialization(format!("Invalid UUID: {}", e)))?;

        let status = TenantStatus::from_db_str(&row.status)
            .ok_or_else(|| DbError::Serialization(format!("Invalid tenant status: {}", row.status)))?;

        let settings: TenantSettings = serde_json::from_str(&row.settings)
            .map_err(|e| DbError::Serialization(format!("Invalid settings JSON: {}", e)))?;

        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| DbError::Serialization(format!("Invalid timestamp: {}", e)))?
            .with_timezone(&Utc);
        let updated_at = DateTime::parse_from_rfc3339(&row.updated_at)
            .map_err(|e| DbError::Serialization(format!("Invalid timestamp: {}", e)))?
            .with_timezone(&Utc);

        Ok(Tenant {
            id,
            name: row.name,
            code: row.code,
            status,
            settings,
            created_at,
            updated_at,
        })
    }
}

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct PgTenantRow {
    id: Uuid,
    name: String,
    code: String,
    status: String,
    settings: serde_json::Value,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(feature = "database")]
impl TryFrom<PgTenantRow> for Tenant {
    type Error = DbError;

    fn try_from(row: PgTenantRow) -> Result<Self, Self::Error> {
        let status = TenantStatus::from_db_str(&row.status)
            .ok_or_else(|| DbError::Serialization(format!("Invalid tenant status: {}", row.status)))?;

        let settings: TenantSettings = serde_json::from_value(row.settings)
            .map_err(|e| DbError::Serialization(format!("Invalid settings JSON: {}", e)))?;

        Ok(Tenant {
            id: row.id,
            name: row.name,
            code: row.code,
            status,
            settings,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_update_default_is_empty() {
        let update = TenantUpdate::default();
        assert!(update.name.is_none());
        assert!(update.status.is_none());
        assert!(update.settings.is_none());
    }
}
