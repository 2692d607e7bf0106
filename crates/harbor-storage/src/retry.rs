//! Bounded retry for transient backend failures.

use std::future::Future;
use std::time::Duration;

use crate::traits::StorageResult;

const MAX_BACKOFF_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// One retry after `backoff`.
    pub fn single(backoff: Duration) -> Self {
        Self {
            max_retries: 1,
            initial_backoff: backoff,
        }
    }

    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Exponential backoff before retry number `attempt` (1-based), capped.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff.as_millis() as u64;
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(base.saturating_mul(factor).min(MAX_BACKOFF_MS))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single(Duration::from_millis(200))
    }
}

/// Run `op`, retrying transient errors up to `policy.max_retries` times.
///
/// Non-transient errors and the error of the last attempt are returned as-is.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    key: &str,
    mut op: F,
) -> StorageResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StorageResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let backoff = policy.backoff_for(attempt);
                tracing::warn!(
                    error = %e,
                    operation = operation,
                    key = %key,
                    attempt = attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "Transient storage error, retrying"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}
