//! Retry and timeout helpers for agent sessions.

use crate::config::RetryPolicy;
use agentkit_core::{AgentError, AgentResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run `operation` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up. The closure receives the zero-based attempt.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> AgentResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = AgentResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        match operation(attempts).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempts + 1 < max_attempts => {
                let backoff = policy.backoff_for_attempt(attempts);
                warn!(
                    attempt = attempts + 1,
                    max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    kind = %e.kind(),
                    error = %e,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                attempts += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    warn!(max_attempts, error = %e, "All attempts failed");
                }
                return Err(e);
            }
        }
    }
}

/// Bound a future by a deadline.
pub async fn with_timeout<T, Fut>(duration: Duration, future: Fut) -> AgentResult<T>
where
    Fut: Future<Output = AgentResult<T>>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| AgentError::Timeout(duration))?
}
