//! Bounded retry with exponential backoff for reasoning calls.
//!
//! Only retryable failures (transport, malformed response) trigger another
//! attempt. Quota and authentication failures end the loop immediately, and
//! a rejected request is given up on after its first attempt.

use crate::error::{FatalError, ReasoningError};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Policy without waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay after the given failed attempt (1-indexed): base, 2×base, 4×base...
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(2u32.pow(exponent))
            .min(self.max_delay)
    }
}

/// How a retried call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome<T> {
    Success { value: T, attempts: u32 },
    /// Attempts ran out, or the call failed in a way repeating cannot fix.
    Exhausted {
        attempts: u32,
        last_error: ReasoningError,
    },
    /// A non-retryable error; the run must stop.
    Fatal { attempts: u32, error: FatalError },
}

/// Run `op` until it succeeds, fails fatally or runs out of attempts.
///
/// `op` receives the 1-indexed attempt number.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ReasoningError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => {
                return RetryOutcome::Success {
                    value,
                    attempts: attempt,
                }
            }
            Err(error) => {
                let error = match error.into_fatal() {
                    Ok(fatal) => {
                        return RetryOutcome::Fatal {
                            attempts: attempt,
                            error: fatal,
                        }
                    }
                    Err(retryable) => retryable,
                };
                if attempt >= max_attempts || !error.is_retryable() {
                    return RetryOutcome::Exhausted {
                        attempts: attempt,
                        last_error: error,
                    };
                }
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    call = label,
                    "reasoning call failed, retrying in {delay:?}: {error}"
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
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 6,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(3000),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_after(4), Duration::from_millis(3000));
        assert_eq!(policy.delay_after(40), Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn test_exhausts_all_attempts_on_transport_failure() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = call_count.clone();

        let outcome: RetryOutcome<()> = with_retry(&RetryPolicy::immediate(3), "BAT 35", |_| {
            let cc = cc.clone();
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err(ReasoningError::TransportFailure("connection reset".into()))
            }
        })
        .await;

        assert_eq!(call_count.load(Ordering::SeqCst), 3);
        assert!(matches!(outcome, RetryOutcome::Exhausted { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_fatal_error_stops_immediately() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = call_count.clone();

        let outcome: RetryOutcome<()> = with_retry(&RetryPolicy::immediate(3), "BAT 1", |_| {
            let cc = cc.clone();
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err(ReasoningError::QuotaExceeded("insufficient_quota".into()))
            }
        })
        .await;

        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert_eq!(
            outcome,
            RetryOutcome::Fatal {
                attempts: 1,
                error: FatalError::QuotaExceeded("insufficient_quota".into())
            }
        );
    }

    #[tokio::test]
    async fn test_rejected_request_is_not_repeated() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = call_count.clone();

        let outcome: RetryOutcome<()> = with_retry(&RetryPolicy::immediate(3), "BAT 4", |_| {
            let cc = cc.clone();
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err(ReasoningError::RequestRejected("404 Not Found".into()))
            }
        })
        .await;

        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(matches!(outcome, RetryOutcome::Exhausted { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_succeeds_after_malformed_response() {
        let outcome = with_retry(&RetryPolicy::immediate(3), "BAT 2", |attempt| async move {
            if attempt == 1 {
                Err(ReasoningError::malformed("missing status", "{}"))
            } else {
                Ok(attempt)
            }
        })
        .await;

        assert_eq!(
            outcome,
            RetryOutcome::Success {
                value: 2,
                attempts: 2
            }
        );
    }
}
