//! Classification-driven retry for database operations.
//!
//! Every attempt's failure is classified into one of three classes:
//! optimistic-concurrency conflicts (reload the record, retry immediately),
//! transient infrastructure faults (retry after exponential backoff), and
//! everything else (fatal, propagated on the spot). Terminal errors carry
//! the full attempt history and the total backoff slept, so callers see
//! everything that went wrong and how long was spent waiting.
//!
//! The loop awaits between attempts, so cancelling the surrounding request
//! drops the future at the next suspension point and no further attempts are
//! scheduled.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::DbError;

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Optimistic-concurrency conflict; reload and retry.
    Conflict,
    /// Transient infrastructure fault; retry with backoff.
    Transient,
    /// Not retryable; fail fast.
    Fatal,
}

/// Classifies a database error for retry purposes.
pub fn classify(error: &DbError) -> ErrorClass {
    match error {
        DbError::Conflict { .. } => ErrorClass::Conflict,
        // Pool exhaustion clears as connections are returned.
        DbError::PoolExhausted => ErrorClass::Transient,
        DbError::Connection(msg) => {
            let msg = msg.to_lowercase();
            if msg.contains("timeout")
                || msg.contains("connection refused")
                || msg.contains("connection reset")
                || msg.contains("broken pipe")
                || msg.contains("network")
                || msg.contains("temporarily unavailable")
            {
                ErrorClass::Transient
            } else {
                ErrorClass::Fatal
            }
        }
        DbError::Transaction(msg) | DbError::Query(msg) => {
            let msg = msg.to_lowercase();
            if msg.contains("deadlock")
                || msg.contains("lock wait timeout")
                || msg.contains("lock timeout")
                || msg.contains("database is locked")
                || msg.contains("busy")
            {
                ErrorClass::Transient
            } else {
                ErrorClass::Fatal
            }
        }
        _ => ErrorClass::Fatal,
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts allowed, including the first.
    pub max_attempts: u32,
    /// Delay before the first transient retry.
    pub initial_delay: Duration,
    /// Cap on the backoff delay.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each transient failure.
    pub backoff_multiplier: f64,
    /// Whether to add up to 25% jitter to delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A configuration that never retries (fail on the first attempt).
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Calculates the backoff delay after a given attempt number (1-based).
    fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let base = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped = base.min(self.max_delay.as_millis() as f64);

        let final_delay = if self.jitter {
            capped * (1.0 + rand_jitter() * 0.25)
        } else {
            capped
        };

        Duration::from_millis(final_delay as u64)
    }
}

/// Pseudo-random jitter factor in [0.0, 1.0), derived from the clock.
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1000) as f64 / 1000.0
}

/// A successful result with its attempt count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    /// The value the work function produced.
    pub value: T,
    /// Total attempts taken, including the successful one.
    pub attempts: u32,
}

/// Executes `f` with classification-driven retry.
///
/// Conflicts are retried immediately, transient faults after exponential
/// backoff, fatal errors propagated at once. When attempts run out the
/// terminal error is [`DbError::ConflictExhausted`] or
/// [`DbError::RetryExhausted`] depending on the final classification, with
/// the accumulated attempt history and total backoff attached.
pub async fn run_with_retry<F, Fut, T>(
    config: RetryConfig,
    operation: &str,
    f: F,
) -> Result<Retried<T>, DbError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, DbError>>,
{
    run_with_recovery(config, operation, f, || async { Ok(()) }).await
}

/// Like [`run_with_retry`], with a recovery hook invoked after each
/// optimistic-concurrency conflict and before the retry.
///
/// The hook is where callers reload the conflicted record so the retry works
/// against current state. Any hook failure is terminal and propagated as-is:
/// without a fresh reload the retry would run against stale state, so the
/// loop never continues past a failed hook.
pub async fn run_with_recovery<F, Fut, R, RFut, T>(
    config: RetryConfig,
    operation: &str,
    f: F,
    reload: R,
) -> Result<Retried<T>, DbError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, DbError>>,
    R: Fn() -> RFut,
    RFut: Future<Output = Result<(), DbError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut history: Vec<String> = Vec::new();
    let mut elapsed = Duration::ZERO;

    for attempt in 1..=max_attempts {
        match f().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = %operation,
                        attempts = attempt,
                        "operation succeeded after retry"
                    );
                }
                return Ok(Retried { value, attempts: attempt });
            }
            Err(err) => {
                let class = classify(&err);
                history.push(format!("attempt {}: {}", attempt, err));

                match class {
                    ErrorClass::Fatal => return Err(err),
                    ErrorClass::Conflict => {
                        if attempt == max_attempts {
                            return Err(DbError::ConflictExhausted {
                                attempts: attempt,
                                elapsed,
                                history,
                            });
                        }
                        warn!(
                            operation = %operation,
                            attempt,
                            max_attempts,
                            error = %err,
                            "concurrency conflict, reloading and retrying"
                        );
                        reload().await?;
                    }
                    ErrorClass::Transient => {
                        if attempt == max_attempts {
                            return Err(DbError::RetryExhausted {
                                attempts: attempt,
                                elapsed,
                                history,
                            });
                        }
                        let delay = config.delay_after(attempt);
                        elapsed += delay;
                        warn!(
                            operation = %operation,
                            attempt,
                            max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "transient database error, retrying"
                        );
                        sleep(delay).await;
                    }
                }
            }
        }
    }

    // Unreachable: every loop iteration returns or continues.
    Err(DbError::Query(format!(
        "retry loop for {} completed without an outcome",
        operation
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay, Duration::from_millis(100));
        assert_eq!(config.backoff_multiplier, 2.0);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let config = RetryConfig {
            jitter: false,
            ..Default::default()
        };
        assert_eq!(config.delay_after(1), Duration::from_millis(100));
        assert_eq!(config.delay_after(2), Duration::from_millis(200));
        assert_eq!(config.delay_after(3), Duration::from_millis(400));
    }

    #[test]
    fn backoff_is_capped() {
        let config = RetryConfig {
            max_delay: Duration::from_millis(150),
            jitter: false,
            ..Default::default()
        };
        assert_eq!(config.delay_after(3), Duration::from_millis(150));
    }

    #[test]
    fn classification() {
        assert_eq!(
            classify(&DbError::conflict("BranchAssignment", "1")),
            ErrorClass::Conflict
        );
        assert_eq!(classify(&DbError::PoolExhausted), ErrorClass::Transient);
        assert_eq!(
            classify(&DbError::Transaction("deadlock detected".to_string())),
            ErrorClass::Transient
        );
        assert_eq!(
            classify(&DbError::Query("database is locked".to_string())),
            ErrorClass::Transient
        );
        assert_eq!(
            classify(&DbError::Connection("connection reset by peer".to_string())),
            ErrorClass::Transient
        );
        assert_eq!(
            classify(&DbError::not_found("Tenant", "1")),
            ErrorClass::Fatal
        );
        assert_eq!(
            classify(&DbError::Constraint {
                kind: crate::db::ConstraintKind::Unique,
                message: "duplicate key".to_string()
            }),
            ErrorClass::Fatal
        );
        assert_eq!(classify(&DbError::TenantRequired), ErrorClass::Fatal);
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let result = run_with_retry(fast_config(3), "test_op", || async { Ok::<_, DbError>(42) })
            .await
            .unwrap();
        assert_eq!(result.value, 42);
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn transient_twice_then_success_reports_three_attempts() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = run_with_retry(fast_config(3), "test_op", || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(DbError::PoolExhausted)
                } else {
                    Ok(7)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result.value, 7);
        assert_eq!(result.attempts, 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn transient_every_time_exhausts_with_history() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = run_with_retry(fast_config(3), "test_op", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(DbError::Transaction("deadlock detected".to_string()))
            }
        })
        .await;

        // The terminal error replaces the original fault type.
        match result {
            Err(DbError::RetryExhausted {
                attempts: n,
                elapsed,
                history,
            }) => {
                assert_eq!(n, 3);
                assert_eq!(history.len(), 3);
                assert!(history[0].contains("deadlock"));
                // Two backoffs at 1ms and 2ms with jitter off.
                assert_eq!(elapsed, Duration::from_millis(3));
            }
            other => panic!("expected RetryExhausted, got {:?}", other.map(|r| r.attempts)),
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_fail_fast() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = run_with_retry(fast_config(3), "test_op", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(DbError::not_found("Tenant", "1"))
            }
        })
        .await;

        assert!(matches!(result, Err(DbError::NotFound { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn conflict_invokes_reload_exactly_once() {
        let attempts = Arc::new(AtomicU32::new(0));
        let reloads = Arc::new(AtomicU32::new(0));
        let attempt_counter = attempts.clone();
        let reload_counter = reloads.clone();

        let result = run_with_recovery(
            fast_config(3),
            "test_op",
            || {
                let counter = attempt_counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n == 0 {
                        Err(DbError::conflict("BranchAssignment", "1"))
                    } else {
                        Ok("saved")
                    }
                }
            },
            || {
                let counter = reload_counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(result.value, "saved");
        assert_eq!(result.attempts, 2);
        assert_eq!(reloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_reload_ends_the_loop() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = run_with_recovery(
            fast_config(5),
            "test_op",
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, _>(DbError::conflict("BranchAssignment", "1"))
                }
            },
            // Even a transient-looking hook failure must not be retried: the
            // record was never reloaded.
            || async { Err(DbError::PoolExhausted) },
        )
        .await;

        assert!(matches!(result, Err(DbError::PoolExhausted)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn conflict_every_time_exhausts_as_conflict() {
        let result = run_with_retry(fast_config(3), "test_op", || async {
            Err::<i32, _>(DbError::conflict("BranchAssignment", "1"))
        })
        .await;

        match result {
            Err(DbError::ConflictExhausted {
                attempts,
                elapsed,
                history,
            }) => {
                assert_eq!(attempts, 3);
                assert_eq!(history.len(), 3);
                // Conflicts retry immediately; no backoff accrues.
                assert_eq!(elapsed, Duration::ZERO);
            }
            _ => panic!("expected ConflictExhausted"),
        }
    }

    #[tokio::test]
    async fn no_retry_config_gives_single_attempt() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = run_with_retry(RetryConfig::no_retry(), "test_op", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(DbError::PoolExhausted)
            }
        })
        .await;

        assert!(matches!(result, Err(DbError::RetryExhausted { attempts: 1, .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_scheduling() {
        // Drop the retry future mid-backoff; the attempt counter must stop.
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let config = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 1.0,
            jitter: false,
        };

        let fut = run_with_retry(config, "test_op", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(DbError::PoolExhausted)
            }
        });

        let result = tokio::time::timeout(Duration::from_millis(50), fut).await;
        assert!(result.is_err(), "expected the retry future to be cancelled");
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
