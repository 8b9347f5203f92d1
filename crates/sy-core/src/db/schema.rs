//! Database schema and migrations.

use super::{DbError, DbPool};

/// Runs schema migrations for the isolation core's tables.
#[cfg(feature = "database")]
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    use tracing::info;

    match pool {
        DbPool::Sqlite(pool) => {
            info!("Running SQLite migrations");
            for statement in sql::SQLITE_STATEMENTS {
                sqlx::query(statement)
                    .execute(pool)
                    .await
                    .map_err(|e| DbError::Migration(e.to_string()))?;
            }
        }
        DbPool::Postgres(pool) => {
            info!("Running PostgreSQL migrations");
            for statement in sql::POSTGRES_STATEMENTS {
                sqlx::query(statement)
                    .execute(pool)
                    .await
                    .map_err(|e| DbError::Migration(e.to_string()))?;
            }
        }
    }

    info!("Migrations completed successfully");
    Ok(())
}

#[cfg(not(feature = "database"))]
pub async fn run_migrations(_pool: &DbPool) -> Result<(), DbError> {
    Err(DbError::Configuration(
        "Database support not enabled".to_string(),
    ))
}

/// Schema statements per backend.
///
/// The tenant directory (`tenants`) has no tenant column: it is the lookup
/// table resolution itself reads. Every other table carries an indexed
/// `tenant_id`. There is deliberately no unique index on
/// `(tenant_id, user_id, is_primary)`; single-primary is maintained by the
/// administrative CRUD that writes assignments.
pub mod sql {
    /// SQLite schema.
    pub const SQLITE_STATEMENTS: &[&str] = &[
        r#"
        CREATE TABLE IF NOT EXISTS tenants (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            code TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL,
            settings TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_tenants_code ON tenants(code)",
        r#"
        CREATE TABLE IF NOT EXISTS branches (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (tenant_id, code)
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_branches_tenant_id ON branches(tenant_id)",
        r#"
        CREATE TABLE IF NOT EXISTS branch_assignments (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
            branch_id TEXT NOT NULL REFERENCES branches(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            role TEXT NOT NULL,
            is_primary INTEGER NOT NULL DEFAULT 0,
            version INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_assignments_tenant_user ON branch_assignments(tenant_id, user_id)",
        "CREATE INDEX IF NOT EXISTS idx_assignments_branch_id ON branch_assignments(branch_id)",
    ];

    /// PostgreSQL schema.
    pub const POSTGRES_STATEMENTS: &[&str] = &[
        r#"
        CREATE TABLE IF NOT EXISTS tenants (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            code TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL,
            settings JSONB NOT NULL,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL,
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_tenants_code ON tenants(code)",
        r#"
        CREATE TABLE IF NOT EXISTS branches (
            id UUID PRIMARY KEY,
            tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL,
            UNIQUE (tenant_id, code)
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_branches_tenant_id ON branches(tenant_id)",
        r#"
        CREATE TABLE IF NOT EXISTS branch_assignments (
            id UUID PRIMARY KEY,
            tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
            branch_id UUID NOT NULL REFERENCES branches(id) ON DELETE CASCADE,
            user_id UUID NOT NULL,
            role TEXT NOT NULL,
            is_primary BOOLEAN NOT NULL DEFAULT FALSE,
            version BIGINT NOT NULL DEFAULT 1,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL,
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_assignments_tenant_user ON branch_assignments(tenant_id, user_id)",
        "CREATE INDEX IF NOT EXISTS idx_assignments_branch_id ON branch_assignments(branch_id)",
    ];
}

#[cfg(all(test, feature = "database"))]
mod tests {
    use super::*;
    use crate::db::create_pool;

    #[tokio::test]
    async fn sqlite_migrations_are_idempotent() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool.close().await;
    }
}
