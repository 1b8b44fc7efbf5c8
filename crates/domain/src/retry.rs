//! Bounded retry for transactional store operations

use std::future::Future;
use std::time::Duration;

use crate::ports::StoreError;

/// How many times a transaction is attempted before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,
    /// Delay before the first retry; doubled for each subsequent retry
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            backoff: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self { attempts, backoff }
    }

    /// Run `body` until it succeeds, fails permanently, or the attempt budget
    /// runs out. Only [`StoreError::is_transient`] failures are retried; the
    /// last transient error is returned once the budget is spent.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut body: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            match body().await {
                Err(e) if e.is_transient() && attempt < attempts => {
                    tracing::warn!(
                        operation,
                        attempt = attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Transient storage conflict, retrying"
                    );
                    let delay = self
                        .backoff
                        .saturating_mul(2_u32.saturating_pow(attempt - 1));
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    tracing::error!(
                        operation,
                        attempts = attempts,
                        error = %e,
                        "Retry budget exhausted"
                    );
                    return Err(e);
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = policy(5)
            .run("test", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(StoreError::Conflict("database is locked".to_string()))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = policy(4)
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::Conflict("database is locked".to_string()))
            })
            .await;

        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = policy(5)
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::MissingReference { ids: vec![1] })
            })
            .await;

        assert!(matches!(result, Err(StoreError::MissingReference { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let _ = policy(0)
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, StoreError>(())
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles() {
        let started = tokio::time::Instant::now();
        let _: Result<(), _> = RetryPolicy::new(3, Duration::from_millis(100))
            .run("test", move || async move {
                Err(StoreError::Conflict("busy".to_string()))
            })
            .await;
        // 100ms + 200ms
        assert!(started.elapsed() >= Duration::from_millis(300));
    }
}
