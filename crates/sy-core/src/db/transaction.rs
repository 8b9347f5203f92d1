//! Transaction boundaries for units of work.
//!
//! [`run_in_transaction`] gives a unit-of-work function exclusive ownership
//! of one transaction: commit on success, rollback on failure, release on
//! every exit path. sqlx transactions roll back when dropped, so a unit of
//! work cancelled mid-flight cannot leave the transaction dangling.

#[cfg(feature = "database")]
use futures::future::BoxFuture;

#[cfg(feature = "database")]
use super::{DbError, DbPool};

/// A transaction on either backend.
///
/// Repositories match on the variant to obtain an executor. PostgreSQL runs
/// these at its default read-committed isolation level; SQLite serializes
/// writers internally.
#[cfg(feature = "database")]
pub enum DbTransaction<'c> {
    /// SQLite transaction.
    Sqlite(sqlx::Transaction<'c, sqlx::Sqlite>),
    /// PostgreSQL transaction.
    Postgres(sqlx::Transaction<'c, sqlx::Postgres>),
}

#[cfg(feature = "database")]
impl DbTransaction<'_> {
    /// Commits the transaction.
    pub async fn commit(self) -> Result<(), DbError> {
        match self {
            DbTransaction::Sqlite(tx) => tx.commit().await?,
            DbTransaction::Postgres(tx) => tx.commit().await?,
        }
        Ok(())
    }

    /// Rolls the transaction back.
    pub async fn rollback(self) -> Result<(), DbError> {
        match self {
            DbTransaction::Sqlite(tx) => tx.rollback().await?,
            DbTransaction::Postgres(tx) => tx.rollback().await?,
        }
        Ok(())
    }
}

#[cfg(feature = "database")]
impl DbPool {
    /// Begins a transaction on this pool.
    pub async fn begin(&self) -> Result<DbTransaction<'static>, DbError> {
        match self {
            DbPool::Sqlite(pool) => Ok(DbTransaction::Sqlite(pool.begin().await?)),
            DbPool::Postgres(pool) => Ok(DbTransaction::Postgres(pool.begin().await?)),
        }
    }
}

/// Runs `work` inside a transaction, committing on `Ok` and rolling back on
/// `Err`.
///
/// The original error is propagated unwrapped so that retry classification
/// composes through the transaction boundary; a rollback failure is logged
/// and does not mask the work's error.
///
/// # Example
///
/// ```ignore
/// let inserted = run_in_transaction(&pool, |tx| {
///     Box::pin(async move {
///         match tx {
///             DbTransaction::Sqlite(tx) => {
///                 sqlx::query("INSERT INTO branches ...")
///                     .execute(&mut **tx)
///                     .await?;
///             }
///             DbTransaction::Postgres(tx) => { /* ... */ }
///         }
///         Ok(1u32)
///     })
/// })
/// .await?;
/// ```
#[cfg(feature = "database")]
pub async fn run_in_transaction<T, F>(pool: &DbPool, work: F) -> Result<T, DbError>
where
    F: for<'t> FnOnce(&'t mut DbTransaction<'static>) -> BoxFuture<'t, Result<T, DbError>>,
{
    let mut tx = pool.begin().await?;
    match work(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "transaction rollback failed");
            }
            Err(err)
        }
    }
}

#[cfg(all(test, feature = "database"))]
mod tests {
    use super::*;
    use crate::db::create_pool;

    async fn test_pool() -> DbPool {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        if let DbPool::Sqlite(sqlite) = &pool {
            sqlx::query("CREATE TABLE items (id INTEGER PRIMARY KEY, label TEXT NOT NULL)")
                .execute(sqlite)
                .await
                .unwrap();
        }
        pool
    }

    async fn count_items(pool: &DbPool) -> i64 {
        match pool {
            DbPool::Sqlite(sqlite) => sqlx::query_scalar("SELECT COUNT(*) FROM items")
                .fetch_one(sqlite)
                .await
                .unwrap(),
            DbPool::Postgres(_) => unreachable!(),
        }
    }

    #[tokio::test]
    async fn commits_on_success() {
        let pool = test_pool().await;

        let rows = run_in_transaction(&pool, |tx| {
            Box::pin(async move {
                match tx {
                    DbTransaction::Sqlite(tx) => {
                        sqlx::query("INSERT INTO items (label) VALUES ('a'), ('b')")
                            .execute(&mut **tx)
                            .await?;
                    }
                    DbTransaction::Postgres(_) => unreachable!(),
                }
                Ok(2u32)
            })
        })
        .await
        .unwrap();

        assert_eq!(rows, 2);
        assert_eq!(count_items(&pool).await, 2);
    }

    #[tokio::test]
    async fn rolls_back_on_error() {
        let pool = test_pool().await;

        let result: Result<(), DbError> = run_in_transaction(&pool, |tx| {
            Box::pin(async move {
                match tx {
                    DbTransaction::Sqlite(tx) => {
                        sqlx::query("INSERT INTO items (label) VALUES ('orphan')")
                            .execute(&mut **tx)
                            .await?;
                    }
                    DbTransaction::Postgres(_) => unreachable!(),
                }
                Err(DbError::Query("simulated failure".to_string()))
            })
        })
        .await;

        assert!(matches!(result, Err(DbError::Query(_))));
        assert_eq!(count_items(&pool).await, 0);
    }

    #[tokio::test]
    async fn propagates_classified_errors_unwrapped() {
        let pool = test_pool().await;

        let result: Result<(), DbError> = run_in_transaction(&pool, |_tx| {
            Box::pin(async move {
                Err(DbError::conflict("Item", "42"))
            })
        })
        .await;

        // Classification must survive the boundary for retry composition.
        assert!(matches!(result, Err(DbError::Conflict { .. })));
    }
}
