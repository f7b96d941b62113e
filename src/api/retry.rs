use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self { Self { max_retries: 2, base_delay: Duration::from_millis(1000) } }
}

impl RetryPolicy {
    pub fn none() -> Self { Self { max_retries: 0, base_delay: Duration::ZERO } }

    /// Exponential backoff: base, 2*base, 4*base, ...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or retries run out.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    with_retry_if(policy, AppError::is_retryable, op).await
}

/// Like `with_retry`, but only errors accepted by `retryable` are retried.
pub async fn with_retry_if<T, F, Fut, P>(policy: &RetryPolicy, retryable: P, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
    P: Fn(&AppError) -> bool,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if retryable(&e) && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                warn!(target: "vaxgate::api", "attempt {} failed ({}); retrying in {:?}", attempt + 1, e, delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
