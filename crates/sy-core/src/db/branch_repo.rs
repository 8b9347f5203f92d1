//! Branch and branch-assignment repository.
//!
//! Every operation here touches tenant-owned tables, so every operation
//! captures a [`TenantScope`] from the ambient identity slot before building
//! SQL. With no tenant installed, each call returns
//! [`DbError::TenantRequired`] without running a query.
//!
//! Assignment updates are guarded by the `version` column: an UPDATE that
//! matches zero rows because the version moved is surfaced as
//! [`DbError::Conflict`], which the resilient executor treats as
//! reload-and-retry.

use super::isolation::TenantScope;
use super::{DbError, DbPool};
use crate::branch::{Branch, BranchAssignment, BranchFacts, BranchRole};
use async_trait::async_trait;
use uuid::Uuid;

/// Repository trait for branches and user-to-branch assignments.
#[async_trait]
pub trait BranchRepository: Send + Sync {
    /// Creates a branch under the ambient tenant.
    async fn create_branch(&self, branch: &Branch) -> Result<Branch, DbError>;

    /// Lists the ambient tenant's branches.
    async fn list_branches(&self) -> Result<Vec<Branch>, DbError>;

    /// Gets one branch by id within the ambient tenant.
    async fn get_branch(&self, id: Uuid) -> Result<Option<Branch>, DbError>;

    /// Creates an assignment under the ambient tenant.
    async fn create_assignment(
        &self,
        assignment: &BranchAssignment,
    ) -> Result<BranchAssignment, DbError>;

    /// Gets one assignment by id within the ambient tenant.
    async fn get_assignment(&self, id: Uuid) -> Result<Option<BranchAssignment>, DbError>;

    /// Resolves a user's primary assignment into branch facts, joined with
    /// the branch record. Users without a primary assignment get
    /// [`BranchFacts::unassigned`].
    async fn primary_assignment(&self, user_id: Uuid) -> Result<BranchFacts, DbError>;

    /// Persists an updated assignment if and only if the stored version still
    /// matches `assignment.version`. On success the stored version is
    /// incremented; a version mismatch is a [`DbError::Conflict`].
    async fn update_assignment(
        &self,
        assignment: &BranchAssignment,
    ) -> Result<BranchAssignment, DbError>;

    /// Reloads an assignment's current state, for conflict recovery.
    async fn reload_assignment(&self, id: Uuid) -> Result<BranchAssignment, DbError>;

    /// Deletes an assignment within the ambient tenant. Returns whether a
    /// row was removed.
    async fn delete_assignment(&self, id: Uuid) -> Result<bool, DbError>;
}

/// SQLite implementation of [`BranchRepository`].
#[cfg(feature = "database")]
pub struct SqliteBranchRepository {
    pool: sqlx::SqlitePool,
}

#[cfg(feature = "database")]
impl SqliteBranchRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl BranchRepository for SqliteBranchRepository {
    async fn create_branch(&self, branch: &Branch) -> Result<Branch, DbError> {
        let scope = TenantScope::current()?;
        scope.verify_write(branch)?;

        sqlx::query(
            r#"
            INSERT INTO branches (id, tenant_id, code, name, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(branch.id.to_string())
        .bind(branch.tenant_id.to_string())
        .bind(&branch.code)
        .bind(&branch.name)
        .bind(branch.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(branch.clone())
    }

    async fn list_branches(&self) -> Result<Vec<Branch>, DbError> {
        let scope = TenantScope::current()?;

        let rows: Vec<SqliteBranchRow> = sqlx::query_as(&format!(
            "SELECT id, tenant_id, code, name, created_at FROM branches WHERE {} ORDER BY name ASC",
            scope.predicate::<Branch>("?")
        ))
        .bind(scope.tenant_id().to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_branch(&self, id: Uuid) -> Result<Option<Branch>, DbError> {
        let scope = TenantScope::current()?;

        let row: Option<SqliteBranchRow> = sqlx::query_as(&format!(
            "SELECT id, tenant_id, code, name, created_at FROM branches WHERE id = ? AND {}",
            scope.predicate::<Branch>("?")
        ))
        .bind(id.to_string())
        .bind(scope.tenant_id().to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn create_assignment(
        &self,
        assignment: &BranchAssignment,
    ) -> Result<BranchAssignment, DbError> {
        let scope = TenantScope::current()?;
        scope.verify_write(assignment)?;

        sqlx::query(
            r#"
            INSERT INTO branch_assignments
                (id, tenant_id, branch_id, user_id, role, is_primary, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(assignment.id.to_string())
        .bind(assignment.tenant_id.to_string())
        .bind(assignment.branch_id.to_string())
        .bind(assignment.user_id.to_string())
        .bind(assignment.role.as_db_str())
        .bind(assignment.is_primary)
        .bind(assignment.version)
        .bind(assignment.created_at.to_rfc3339())
        .bind(assignment.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(assignment.clone())
    }

    async fn get_assignment(&self, id: Uuid) -> Result<Option<BranchAssignment>, DbError> {
        let scope = TenantScope::current()?;

        let row: Option<SqliteAssignmentRow> = sqlx::query_as(&format!(
            "SELECT id, tenant_id, branch_id, user_id, role, is_primary, version, created_at, updated_at \
             FROM branch_assignments WHERE id = ? AND {}",
            scope.predicate::<BranchAssignment>("?")
        ))
        .bind(id.to_string())
        .bind(scope.tenant_id().to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn primary_assignment(&self, user_id: Uuid) -> Result<BranchFacts, DbError> {
        let scope = TenantScope::current()?;

        let row: Option<SqlitePrimaryRow> = sqlx::query_as(
            r#"
            SELECT a.branch_id, b.code AS branch_code, b.name AS branch_name, a.role
            FROM branch_assignments a
            JOIN branches b ON b.id = a.branch_id AND b.tenant_id = a.tenant_id
            WHERE a.user_id = ? AND a.is_primary = 1 AND a.tenant_id = ?
            LIMIT 1
            "#,
        )
        .bind(user_id.to_string())
        .bind(scope.tenant_id().to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.try_into(),
            None => Ok(BranchFacts::unassigned()),
        }
    }

    async fn update_assignment(
        &self,
        assignment: &BranchAssignment,
    ) -> Result<BranchAssignment, DbError> {
        let scope = TenantScope::current()?;
        scope.verify_write(assignment)?;

        let result = sqlx::query(
            r#"
            UPDATE branch_assignments
            SET branch_id = ?, role = ?, is_primary = ?, version = version + 1, updated_at = ?
            WHERE id = ? AND tenant_id = ? AND version = ?
            "#,
        )
        .bind(assignment.branch_id.to_string())
        .bind(assignment.role.as_db_str())
        .bind(assignment.is_primary)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(assignment.id.to_string())
        .bind(assignment.tenant_id.to_string())
        .bind(assignment.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict("BranchAssignment", assignment.id));
        }

        self.reload_assignment(assignment.id).await
    }

    async fn reload_assignment(&self, id: Uuid) -> Result<BranchAssignment, DbError> {
        self.get_assignment(id)
            .await?
            .ok_or_else(|| DbError::not_found("BranchAssignment", id))
    }

    async fn delete_assignment(&self, id: Uuid) -> Result<bool, DbError> {
        let scope = TenantScope::current()?;

        let result = sqlx::query("DELETE FROM branch_assignments WHERE id = ? AND tenant_id = ?")
            .bind(id.to_string())
            .bind(scope.tenant_id().to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// PostgreSQL implementation of [`BranchRepository`].
#[cfg(feature = "database")]
pub struct PgBranchRepository {
    pool: sqlx::PgPool,
}

#[cfg(feature = "database")]
impl PgBranchRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl BranchRepository for PgBranchRepository {
    async fn create_branch(&self, branch: &Branch) -> Result<Branch, DbError> {
        let scope = TenantScope::current()?;
        scope.verify_write(branch)?;

        sqlx::query(
            r#"
            INSERT INTO branches (id, tenant_id, code, name, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(branch.id)
        .bind(branch.tenant_id)
        .bind(&branch.code)
        .bind(&branch.name)
        .bind(branch.created_at)
        .execute(&self.pool)
        .await?;

        Ok(branch.clone())
    }

    async fn list_branches(&self) -> Result<Vec<Branch>, DbError> {
        let scope = TenantScope::current()?;

        let rows: Vec<PgBranchRow> = sqlx::query_as(&format!(
            "SELECT id, tenant_id, code, name, created_at FROM branches WHERE {} ORDER BY name ASC",
            scope.predicate::<Branch>("$1")
        ))
        .bind(scope.tenant_id())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_branch(&self, id: Uuid) -> Result<Option<Branch>, DbError> {
        let scope = TenantScope::current()?;

        let row: Option<PgBranchRow> = sqlx::query_as(&format!(
            "SELECT id, tenant_id, code, name, created_at FROM branches WHERE id = $1 AND {}",
            scope.predicate::<Branch>("$2")
        ))
        .bind(id)
        .bind(scope.tenant_id())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn create_assignment(
        &self,
        assignment: &BranchAssignment,
    ) -> Result<BranchAssignment, DbError> {
        let scope = TenantScope::current()?;
        scope.verify_write(assignment)?;

        sqlx::query(
            r#"
            INSERT INTO branch_assignments
                (id, tenant_id, branch_id, user_id, role, is_primary, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(assignment.id)
        .bind(assignment.tenant_id)
        .bind(assignment.branch_id)
        .bind(assignment.user_id)
        .bind(assignment.role.as_db_str())
        .bind(assignment.is_primary)
        .bind(assignment.version)
        .bind(assignment.created_at)
        .bind(assignment.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(assignment.clone())
    }

    async fn get_assignment(&self, id: Uuid) -> Result<Option<BranchAssignment>, DbError> {
        let scope = TenantScope::current()?;

        let row: Option<PgAssignmentRow> = sqlx::query_as(&format!(
            "SELECT id, tenant_id, branch_id, user_id, role, is_primary, version, created_at, updated_at \
             FROM branch_assignments WHERE id = $1 AND {}",
            scope.predicate::<BranchAssignment>("$2")
        ))
        .bind(id)
        .bind(scope.tenant_id())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn primary_assignment(&self, user_id: Uuid) -> Result<BranchFacts, DbError> {
        let scope = TenantScope::current()?;

        let row: Option<PgPrimaryRow> = sqlx::query_as(
            r#"
            SELECT a.branch_id, b.code AS branch_code, b.name AS branch_name, a.role
            FROM branch_assignments a
            JOIN branches b ON b.id = a.branch_id AND b.tenant_id = a.tenant_id
            WHERE a.user_id = $1 AND a.is_primary = TRUE AND a.tenant_id = $2
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(scope.tenant_id())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.try_into(),
            None => Ok(BranchFacts::unassigned()),
        }
    }

    async fn update_assignment(
        &self,
        assignment: &BranchAssignment,
    ) -> Result<BranchAssignment, DbError> {
        let scope = TenantScope::current()?;
        scope.verify_write(assignment)?;

        let result = sqlx::query(
            r#"
            UPDATE branch_assignments
            SET branch_id = $1, role = $2, is_primary = $3, version = version + 1, updated_at = NOW()
            WHERE id = $4 AND tenant_id = $5 AND version = $6
            "#,
        )
        .bind(assignment.branch_id)
        .bind(assignment.role.as_db_str())
        .bind(assignment.is_primary)
        .bind(assignment.id)
        .bind(assignment.tenant_id)
        .bind(assignment.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict("BranchAssignment", assignment.id));
        }

        self.reload_assignment(assignment.id).await
    }

    async fn reload_assignment(&self, id: Uuid) -> Result<BranchAssignment, DbError> {
        self.get_assignment(id)
            .await?
            .ok_or_else(|| DbError::not_found("BranchAssignment", id))
    }

    async fn delete_assignment(&self, id: Uuid) -> Result<bool, DbError> {
        let scope = TenantScope::current()?;

        let result =
            sqlx::query("DELETE FROM branch_assignments WHERE id = $1 AND tenant_id = $2")
                .bind(id)
                .bind(scope.tenant_id())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Creates the repository matching the pool's backend.
#[cfg(feature = "database")]
pub fn create_branch_repository(pool: &DbPool) -> Box<dyn BranchRepository> {
    match pool {
        DbPool::Sqlite(pool) => Box::new(SqliteBranchRepository::new(pool.clone())),
        DbPool::Postgres(pool) => Box::new(PgBranchRepository::new(pool.clone())),
    }
}

// Row mapping helpers.

#[cfg(feature = "database")]
fn parse_uuid(value: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::Serialization(format!("Invalid UUID: {}", e)))
}

#[cfg(feature = "database")]
fn parse_timestamp(value: &str) -> Result<chrono::DateTime<chrono::Utc>, DbError> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| DbError::Serialization(format!("Invalid timestamp: {}", e)))
}

#[cfg(feature = "database")]
fn parse_role(value: &str) -> Result<BranchRole, DbError> {
    BranchRole::from_db_str(value)
        .ok_or_else(|| DbError::Serialization(format!("Invalid branch role: {}", value)))
}

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct SqliteBranchRow {
    id: String,
    tenant_id: String,
    code: String,
    name: String,
    created_at: String,
}

#[cfg(feature = "database")]
impl TryFrom<SqliteBranchRow> for Branch {
    type Error = DbError;

    fn try_from(row: SqliteBranchRow) -> Result<Self, Self::Error> {
        Ok(Branch {
            id: parse_uuid(&row.id)?,
            tenant_id: parse_uuid(&row.tenant_id)?,
            code: row.code,
            name: row.name,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct SqliteAssignmentRow {
    id: String,
    tenant_id: String,
    branch_id: String,
    user_id: String,
    role: String,
    is_primary: bool,
    version: i64,
    created_at: String,
    updated_at: String,
}

#[cfg(feature = "database")]
impl TryFrom<SqliteAssignmentRow> for BranchAssignment {
    type Error = DbError;

    fn try_from(row: SqliteAssignmentRow) -> Result<Self, Self::Error> {
        Ok(BranchAssignment {
            id: parse_uuid(&row.id)?,
            tenant_id: parse_uuid(&row.tenant_id)?,
            branch_id: parse_uuid(&row.branch_id)?,
            user_id: parse_uuid(&row.user_id)?,
            role: parse_role(&row.role)?,
            is_primary: row.is_primary,
            version: row.version,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct SqlitePrimaryRow {
    branch_id: String,
    branch_code: String,
    branch_name: String,
    role: String,
}

#[cfg(feature = "database")]
impl TryFrom<SqlitePrimaryRow> for BranchFacts {
    type Error = DbError;

    fn try_from(row: SqlitePrimaryRow) -> Result<Self, Self::Error> {
        Ok(BranchFacts {
            branch_id: Some(parse_uuid(&row.branch_id)?),
            branch_code: Some(row.branch_code),
            branch_name: Some(row.branch_name),
            role: parse_role(&row.role)?,
        })
    }
}

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct PgBranchRow {
    id: Uuid,
    tenant_id: Uuid,
    code: String,
    name: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(feature = "database")]
impl TryFrom<PgBranchRow> for Branch {
    type Error = DbError;

    fn try_from(row: PgBranchRow) -> Result<Self, Self::Error> {
        Ok(Branch {
            id: row.id,
            tenant_id: row.tenant_id,
            code: row.code,
            name: row.name,
            created_at: row.created_at,
        })
    }
}

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct PgAssignmentRow {
    id: Uuid,
    tenant_id: Uuid,
    branch_id: Uuid,
    user_id: Uuid,
    role: String,
    is_primary: bool,
    version: i64,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(feature = "database")]
impl TryFrom<PgAssignmentRow> for BranchAssignment {
    type Error = DbError;

    fn try_from(row: PgAssignmentRow) -> Result<Self, Self::Error> {
        Ok(BranchAssignment {
            id: row.id,
            tenant_id: row.tenant_id,
            branch_id: row.branch_id,
            user_id: row.user_id,
            role: parse_role(&row.role)?,
            is_primary: row.is_primary,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct PgPrimaryRow {
    branch_id: Uuid,
    branch_code: String,
    branch_name: String,
    role: String,
}

#[cfg(feature = "database")]
impl TryFrom<PgPrimaryRow> for BranchFacts {
    type Error = DbError;

    fn try_from(row: PgPrimaryRow) -> Result<Self, Self::Error> {
        Ok(BranchFacts {
            branch_id: Some(row.branch_id),
            branch_code: Some(row.branch_code),
            branch_name: Some(row.branch_name),
            role: parse_role(&row.role)?,
        })
    }
}
