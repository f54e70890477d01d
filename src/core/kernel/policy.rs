use crate::core::errors::PelagosError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Decision for a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Sleep for the given delay, then attempt again.
    Retry(Duration),
    /// Surface the error to the caller unchanged.
    Fatal,
}

/// Shared retry/backoff decision logic for both transports.
///
/// Pure data in, decision out: given a classified error and the 0-indexed
/// retry count so far, decide whether to retry and how long to wait. The
/// delay for retry `k` is `base_delay * 2^k`, capped at `max_delay`; a
/// rate-limit response substitutes the server-provided hint when present.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt (total attempts = max_retries + 1).
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Self::default()
        }
    }

    /// Backoff delay for the given 0-indexed retry count.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Classify a failed attempt: retryable failures get a delay as long as
    /// the attempt budget allows, everything else is fatal immediately.
    pub fn assess(&self, error: &PelagosError, attempt: u32) -> Verdict {
        if attempt >= self.max_retries {
            return Verdict::Fatal;
        }

        match error {
            PelagosError::Network(_) | PelagosError::Timeout(_) => {
                Verdict::Retry(self.delay_for(attempt))
            }
            PelagosError::RateLimited { retry_after } => Verdict::Retry(
                retry_after
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| self.delay_for(attempt)),
            ),
            PelagosError::Api { status, .. } if *status >= 500 => {
                Verdict::Retry(self.delay_for(attempt))
            }
            _ => Verdict::Fatal,
        }
    }
}

/// Drive an operation through the policy: attempt, classify, sleep, repeat.
///
/// Retries of one logical operation are strictly sequential; on a fatal
/// verdict or an exhausted budget the most recent typed error is returned
/// unchanged.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, PelagosError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PelagosError>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => match policy.assess(&error, attempt) {
                Verdict::Retry(delay) => {
                    debug!(attempt, delay_ms = delay.as_millis() as u64, %error, "retrying");
                    sleep(delay).await;
                    attempt += 1;
                }
                Verdict::Fatal => return Err(error),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
        }
    }

    #[test]
    fn delays_double_per_attempt() {
        let policy = policy();
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy {
            max_retries: 20,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        };
        assert_eq!(policy.delay_for(10), Duration::from_secs(60));
        // overflow-proof for absurd attempt counts
        assert_eq!(policy.delay_for(40), Duration::from_secs(60));
    }

    #[test]
    fn server_errors_are_retryable() {
        let err = PelagosError::Api {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert_eq!(
            policy().assess(&err, 0),
            Verdict::Retry(Duration::from_millis(100))
        );
    }

    #[test]
    fn client_errors_are_fatal() {
        let err = PelagosError::Api {
            status: 400,
            body: "bad order".to_string(),
        };
        assert_eq!(policy().assess(&err, 0), Verdict::Fatal);
    }

    #[test]
    fn rate_limit_uses_server_hint() {
        let err = PelagosError::RateLimited {
            retry_after: Some(7),
        };
        assert_eq!(
            policy().assess(&err, 0),
            Verdict::Retry(Duration::from_secs(7))
        );

        let no_hint = PelagosError::RateLimited { retry_after: None };
        assert_eq!(
            policy().assess(&no_hint, 1),
            Verdict::Retry(Duration::from_millis(200))
        );
    }

    #[test]
    fn budget_exhaustion_is_fatal_even_for_retryable_errors() {
        let err = PelagosError::Network("refused".to_string());
        assert_eq!(policy().assess(&err, 3), Verdict::Fatal);
    }

    #[test]
    fn signing_failures_never_retry() {
        let err = PelagosError::Signing("bad key".to_string());
        assert_eq!(policy().assess(&err, 0), Verdict::Fatal);
    }
}
