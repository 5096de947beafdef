use rand::{RngExt, rng};
use std::time::Duration;
use tracing::warn;

use crate::HydrationError;
use crate::observability;

/// Retry policy for store calls: exponential backoff with jitter, applied
/// only to errors that report themselves as retryable.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub async fn retry_async<F, Fut, T>(&self, operation: &str, mut f: F) -> Result<T, HydrationError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, HydrationError>>,
    {
        let mut attempt = 0u32;
        loop {
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        return Err(e);
                    }
                    let max_delay = self.base_delay * (1u32 << attempt.min(16));
                    let max_ms = (max_delay.as_millis() as u64).max(1);
                    let jitter = rng().random_range(0..max_ms);
                    warn!(operation, attempt, delay_ms = jitter, error = %e, "retrying store call");
                    observability::record_store_retry(operation);
                    tokio::time::sleep(Duration::from_millis(jitter)).await;
                }
            }
        }
    }
}
