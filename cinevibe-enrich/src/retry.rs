//! Retry with exponential backoff for external calls
//!
//! Generic wrapper shared by every network-bound collaborator call. Each
//! attempt optionally acquires a rate-limiter token first; outcomes are
//! reported back to the limiter so its adaptive delay tracks the service's
//! actual behavior.
//!
//! Failure classification is structural: collaborators return a typed
//! [`ProviderError`], so the executor never inspects message text.

use crate::error::ProviderError;
use crate::limiter::ServiceLimiter;
use std::time::Duration;

/// Backoff policy for one class of external call
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = max_retries + 1)
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Sleep duration before retry number `attempt` (0-based attempt index)
    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.initial_delay
            .mul_f64(self.backoff_multiplier.powi(attempt as i32))
    }
}

/// Run `op` with backoff, cooperating with an optional rate limiter.
///
/// On each attempt: acquire a limiter token (if a limiter is given), invoke
/// `op`, and on success report success to the limiter and return. On failure
/// the error is reported to the limiter (rate-limit vs. generic), and unless
/// the error is non-retryable or retries are exhausted, the executor sleeps
/// `initial_delay × multiplier^attempt` and tries again. Exhausting retries
/// re-raises the last error; the caller decides whether that means tier
/// fallthrough or item failure.
pub async fn retry_with_backoff<T, F, Fut>(
    operation_name: &str,
    policy: RetryPolicy,
    limiter: Option<&ServiceLimiter>,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ProviderError>>,
{
    let mut attempt: u32 = 0;

    loop {
        if let Some(limiter) = limiter {
            limiter.acquire().await;
        }

        match op().await {
            Ok(value) => {
                if let Some(limiter) = limiter {
                    limiter.report_success().await;
                }
                if attempt > 0 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => {
                if let Some(limiter) = limiter {
                    if err.is_rate_limit() {
                        limiter.report_rate_limit().await;
                    } else {
                        limiter.report_error().await;
                    }
                }

                if !err.is_retryable() {
                    tracing::debug!(
                        operation = operation_name,
                        error = %err,
                        "Non-retryable error, failing immediately"
                    );
                    return Err(err);
                }

                if attempt >= policy.max_retries {
                    tracing::warn!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        error = %err,
                        "Retries exhausted"
                    );
                    return Err(err);
                }

                let delay = policy.backoff_delay(attempt);
                tracing::debug!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    backoff_ms = delay.as_millis() as u64,
                    error = %err,
                    "Operation failed, will retry after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinevibe_common::config::ServiceRateSettings;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let result =
            retry_with_backoff("op", fast_policy(), None, || async { Ok::<_, ProviderError>(42) })
                .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let attempts = AtomicU32::new(0);
        let result = retry_with_backoff("op", fast_policy(), None, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::Network("connection reset".to_string()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_retries_and_reraises_last_error() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff("op", fast_policy(), None, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Timeout { service: "content".to_string() }) }
        })
        .await;

        assert!(matches!(result, Err(ProviderError::Timeout { .. })));
        // max_retries = 3 → 4 total attempts
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff("op", fast_policy(), None, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Auth { service: "llm".to_string() }) }
        })
        .await;

        assert!(matches!(result, Err(ProviderError::Auth { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_reported_to_limiter() {
        let limiter = ServiceLimiter::new(
            "content",
            &ServiceRateSettings {
                requests_per_second: 100,
                delay_ms: 0,
                max_delay_ms: 10_000,
            },
        );

        let attempts = AtomicU32::new(0);
        let _: Result<(), _> = retry_with_backoff(
            "op",
            RetryPolicy { max_retries: 1, ..fast_policy() },
            Some(&limiter),
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ProviderError::RateLimited { service: "content".to_string() })
                }
            },
        )
        .await;

        // Two rate-limit reports must have grown the adaptive delay
        assert!(limiter.current_delay().await > Duration::ZERO);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_success_resets_limiter_streak() {
        let limiter = ServiceLimiter::new(
            "content",
            &ServiceRateSettings {
                requests_per_second: 100,
                delay_ms: 50,
                max_delay_ms: 10_000,
            },
        );
        limiter.report_rate_limit().await;
        let inflated = limiter.current_delay().await;

        let result =
            retry_with_backoff("op", fast_policy(), Some(&limiter), || async { Ok(1) }).await;
        assert_eq!(result.unwrap(), 1);
        assert!(limiter.current_delay().await < inflated);
    }
}
