//! Retry Logic
//!
//! Implements bounded exponential backoff for transient upstream failures.
//! Used by every fallback tier call; generic so other network calls can use it too.

use super::clock::Clock;
use bowl_common::EngineParams;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on attempts regardless of configuration
pub const MAX_ATTEMPTS: u32 = 5;

/// Retry schedule for one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first (1-5)
    pub max_attempts: u32,
    /// Delay after the first failure; doubles after each further failure
    pub base_delay: Duration,
    /// Each attempt is abandoned after this long
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, MAX_ATTEMPTS),
            base_delay,
            attempt_timeout,
        }
    }

    pub fn from_params(params: &EngineParams) -> Self {
        Self::new(
            params.retry_attempts,
            params.retry_base_delay(),
            params.attempt_timeout(),
        )
    }

    /// Backoff after failed attempt number `attempt` (1-based):
    /// `base_delay * 2^(attempt-1)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

/// Last failure after all attempts were used
#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("attempt {attempt} timed out after {timeout_ms} ms")]
    TimedOut { attempt: u32, timeout_ms: u64 },

    #[error("attempt {attempt} failed: {error}")]
    Failed { attempt: u32, error: E },
}

impl<E> RetryError<E> {
    /// Number of attempts made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::TimedOut { attempt, .. } | RetryError::Failed { attempt, .. } => *attempt,
        }
    }
}

/// Run `operation` until it succeeds or `policy.max_attempts` is reached.
///
/// **Algorithm:**
/// 1. Attempt operation, raced against `attempt_timeout`
/// 2. If successful, return result
/// 3. If attempts remain: log WARN, sleep `base_delay * 2^(attempt-1)`, retry
/// 4. Otherwise return the last failure (timeout or operation error)
///
/// All waiting goes through `clock`, so schedules are observable in tests.
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g., "popular")
/// * `operation` - Closure producing a fresh attempt future each call
pub async fn with_retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    clock: &dyn Clock,
    operation_name: &str,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.clamp(1, MAX_ATTEMPTS);
    let timeout_ms = policy.attempt_timeout.as_millis() as u64;
    let mut attempt = 0;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying operation");
        }

        let outcome = tokio::select! {
            biased;
            result = operation() => result.map_err(|error| RetryError::Failed { attempt, error }),
            _ = clock.sleep(policy.attempt_timeout) => Err(RetryError::TimedOut { attempt, timeout_ms }),
        };

        match outcome {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => {
                if attempt >= max_attempts {
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Operation failed: retry attempts exhausted"
                    );
                    return Err(err);
                }

                let backoff = policy.delay_for(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Operation failed, will retry after backoff"
                );

                clock.sleep(backoff).await;
            }
        }
    }
}
