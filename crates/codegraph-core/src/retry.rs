//! Retry-with-backoff wrapper for store operations (§4.3).
//!
//! Grounded on `Neo4jConnectionManager.connect()` in the original
//! `neo4j_manager.py`: up to `max_retries` attempts, exponential backoff
//! starting at `initial_delay` and doubling each attempt, only retrying
//! errors the caller classifies as transient.

use crate::error::CoreError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub factor: u32,
}

impl Default for RetryPolicy {
    /// 3 attempts, base 1s, factor 2 — the exact parameters §4.3 names.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            factor: 2,
        }
    }
}

impl RetryPolicy {
    /// Runs `op`, retrying on `CoreError::is_retryable` errors only, up to
    /// `max_attempts` total tries. Non-retryable errors return immediately.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    warn!(attempt, max = self.max_attempts, error = %err, "retrying after transient error");
                    tokio::time::sleep(delay).await;
                    delay *= self.factor;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            factor: 2,
        };
        let calls = AtomicU32::new(0);
        let result = policy
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(CoreError::DatabaseConnection("unavailable".into()))
                } else {
                    Ok(42)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_fails_immediately() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), CoreError> = policy
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CoreError::DatabaseQuery("constraint violation".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_attempts_then_surfaces_error() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            factor: 2,
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), CoreError> = policy
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CoreError::DatabaseConnection("down".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
