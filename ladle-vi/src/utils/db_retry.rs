//! Retry wrapper for transient SQLite lock errors
//!
//! SQLite allows one writer at a time, and the pipeline task shares the
//! pool with API handlers, so writes can momentarily collide. Lock errors
//! are retried with exponential backoff until the time budget from the
//! vi_database_max_lock_wait_ms setting runs out. Any other error is
//! returned unchanged on the first hit.

use ladle_common::{Error, Result};
use std::time::{Duration, Instant};

/// Initial retry delay; doubles per attempt.
const INITIAL_BACKOFF_MS: u64 = 10;

/// Upper bound on the delay between attempts.
const MAX_BACKOFF_MS: u64 = 1000;

fn is_lock_error(err: &Error) -> bool {
    match err {
        Error::Database(db_err) => db_err.to_string().contains("database is locked"),
        _ => false,
    }
}

/// Run `operation`, retrying while it reports the database as locked.
///
/// `max_wait_ms` bounds the total time spent across attempts, not the
/// attempt count. When the budget is exhausted the lock error is replaced
/// with an Internal error naming the operation, attempt count, and
/// elapsed time so the log points at the contention site.
pub async fn retry_on_lock<F, Fut, T>(
    operation_name: &str,
    max_wait_ms: u64,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let started = Instant::now();
    let budget = Duration::from_millis(max_wait_ms);
    let mut backoff_ms = INITIAL_BACKOFF_MS;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    let elapsed_ms = started.elapsed().as_millis();
                    if elapsed_ms > 2000 {
                        tracing::warn!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms = elapsed_ms,
                            "Database operation succeeded after prolonged lock contention"
                        );
                    } else {
                        tracing::debug!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms = elapsed_ms,
                            "Database operation succeeded after retry"
                        );
                    }
                }
                return Ok(result);
            }
            Err(err) if is_lock_error(&err) => {
                let elapsed = started.elapsed();
                if elapsed >= budget {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis(),
                        max_wait_ms,
                        "Database locked, retry budget exhausted"
                    );
                    return Err(Error::Internal(format!(
                        "Database locked after {} attempts ({} ms elapsed, max {} ms)",
                        attempt,
                        elapsed.as_millis(),
                        max_wait_ms
                    )));
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    elapsed_ms = elapsed.as_millis(),
                    backoff_ms,
                    "Database locked, will retry after backoff"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
            Err(err) => return Err(err),
        }
    }
}
