//! Generic retry-with-backoff around backend and network calls.
//!
//! Failures are split into transient (network, timeout, subscription drop)
//! and fatal (authorization, validation).  Only transient failures are
//! retried; fatal ones surface immediately.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Classification consumed by [`retry`].  Implemented by every error type
/// that crosses a retried boundary.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Capped exponential backoff parameters.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Backoff cap.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(5000),
        }
    }
}

/// `min(base * 2^attempt, max)`, with `attempt` counted from zero.
pub fn backoff_delay(base: Duration, max: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.min(16)).min(max)
}

/// Run `op`, retrying transient failures per `policy`.
///
/// The last error is returned once attempts are exhausted.  Fatal errors
/// are returned from whichever attempt produced them.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    E: Transient + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => {
                debug!(error = %e, "non-transient failure, not retrying");
                return Err(e);
            }
            Err(e) => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    warn!(error = %e, attempts = attempt, "retries exhausted");
                    return Err(e);
                }
                let delay = backoff_delay(policy.base_delay, policy.max_delay, attempt - 1);
                debug!(error = %e, attempt, delay_ms = delay.as_millis() as u64, "transient failure, backing off");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
