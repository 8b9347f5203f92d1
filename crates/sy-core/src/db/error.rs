//! Database error types and constraint classification.

use std::time::Duration;
use thiserror::Error;

/// Category of a violated constraint, used to map fatal persistence errors
/// to field-level validation messages at the API edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Foreign-key violation: a referenced row does not exist.
    ForeignKey,
    /// Uniqueness violation: a duplicate key.
    Unique,
    /// Check-constraint violation.
    Check,
    /// The store reported a constraint failure it could not classify further.
    Other,
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintKind::ForeignKey => write!(f, "foreign key"),
            ConstraintKind::Unique => write!(f, "unique"),
            ConstraintKind::Check => write!(f, "check"),
            ConstraintKind::Other => write!(f, "other"),
        }
    }
}

/// Errors that can occur during database operations.
#[derive(Error, Debug)]
pub enum DbError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("Query error: {0}")]
    Query(String),

    /// Record not found.
    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// Optimistic-concurrency conflict: another writer modified the record
    /// since it was last read. Retryable after reloading the record.
    #[error("Concurrency conflict: {entity} with id {id} was modified by another writer")]
    Conflict { entity: String, id: String },

    /// Optimistic-conflict retries exhausted. Terminal; the caller should
    /// reload and re-present changes to the end user. `elapsed` is the total
    /// backoff slept across the attempts.
    #[error("Concurrency conflict persisted after {attempts} attempts")]
    ConflictExhausted {
        attempts: u32,
        elapsed: Duration,
        history: Vec<String>,
    },

    /// Transient-fault retries exhausted. Terminal; the caller should treat
    /// this as a temporary outage. `elapsed` is the total backoff slept
    /// across the attempts.
    #[error("Transient database failures persisted after {attempts} attempts ({elapsed:?} in backoff)")]
    RetryExhausted {
        attempts: u32,
        elapsed: Duration,
        history: Vec<String>,
    },

    /// Constraint violation, categorized where the store makes the kind
    /// distinguishable. Fatal; never retried.
    #[error("Constraint violation ({kind}): {message}")]
    Constraint {
        kind: ConstraintKind,
        message: String,
    },

    /// A tenant-scoped operation ran with an empty identity slot. The
    /// isolation layer fails closed instead of defaulting to any tenant.
    #[error("Tenant-scoped operation attempted without a resolved tenant")]
    TenantRequired,

    /// A fetched row belongs to a different tenant than the ambient scope.
    #[error("Row ownership mismatch for {entity}")]
    TenantMismatch { entity: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Pool exhausted.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Invalid configuration.
    #[error("Invalid database configuration: {0}")]
    Configuration(String),
}

impl DbError {
    /// Convenience constructor for not-found errors.
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        DbError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for conflict errors.
    pub fn conflict(entity: &str, id: impl std::fmt::Display) -> Self {
        DbError::Conflict {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "unknown".to_string(),
                id: "unknown".to_string(),
            },
            sqlx::Error::Database(db_err) => {
                let kind = if db_err.is_unique_violation() {
                    Some(ConstraintKind::Unique)
                } else if db_err.is_foreign_key_violation() {
                    Some(ConstraintKind::ForeignKey)
                } else if db_err.is_check_violation() {
                    Some(ConstraintKind::Check)
                } else {
                    None
                };
                match kind {
                    Some(kind) => DbError::Constraint {
                        kind,
                        message: db_err.message().to_string(),
                    },
                    None => DbError::Query(db_err.message().to_string()),
                }
            }
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::Io(io_err) => DbError::Connection(io_err.to_string()),
            sqlx::Error::Tls(tls_err) => DbError::Connection(tls_err.to_string()),
            sqlx::Error::Configuration(msg) => DbError::Configuration(msg.to_string()),
            _ => DbError::Query(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_kind_display() {
        assert_eq!(ConstraintKind::ForeignKey.to_string(), "foreign key");
        assert_eq!(ConstraintKind::Unique.to_string(), "unique");
        assert_eq!(ConstraintKind::Check.to_string(), "check");
    }

    #[test]
    fn not_found_constructor() {
        let err = DbError::not_found("BranchAssignment", "abc");
        assert!(matches!(err, DbError::NotFound { .. }));
        assert!(err.to_string().contains("BranchAssignment"));
    }

    #[test]
    fn conflict_constructor() {
        let err = DbError::conflict("BranchAssignment", "abc");
        assert!(err.to_string().contains("modified by another writer"));
    }

    #[test]
    fn terminal_errors_carry_attempt_counts_and_backoff() {
        let err = DbError::ConflictExhausted {
            attempts: 3,
            elapsed: Duration::ZERO,
            history: vec!["attempt 1: conflict".to_string()],
        };
        assert!(err.to_string().contains("3 attempts"));

        let err = DbError::RetryExhausted {
            attempts: 3,
            elapsed: Duration::from_millis(300),
            history: vec![],
        };
        assert!(err.to_string().contains("3 attempts"));
        assert!(err.to_string().contains("300ms"));
    }

    #[test]
    fn serde_json_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
        let err: DbError = json_err.into();
        assert!(matches!(err, DbError::Serialization(_)));
    }
}
