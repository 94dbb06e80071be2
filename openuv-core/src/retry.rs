//! Retry policy for transient request failures.

use std::{future::Future, time::Duration};

use tracing::{debug, warn};

use crate::error::Error;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `initial * 2^(attempt - 1)`, capped at `max`.
    Exponential { initial: Duration, max: Duration },
    Constant(Duration),
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential {
            initial: DEFAULT_INITIAL_DELAY,
            max: DEFAULT_MAX_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. 0 and 1 both mean "no retry".
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    pub fn none() -> Self {
        Self::new(1, Backoff::Constant(Duration::ZERO))
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Constant(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let shift = attempt.saturating_sub(1).min(31);
                initial.saturating_mul(1u32 << shift).min(max)
            }
        }
    }

    /// Run `operation` until it succeeds, fails with a non-retriable error,
    /// or the attempt budget is spent. The last classified error is returned.
    pub async fn run<F, Fut, T>(&self, endpoint: &str, mut operation: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retriable() => {
                    debug!(target: "openuv", "{endpoint}: giving up on non-retriable error: {err}");
                    return Err(err);
                }
                Err(err) if attempt >= max_attempts => {
                    debug!(
                        target: "openuv",
                        "{endpoint}: giving up after {attempt} attempt(s): {err}"
                    );
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        target: "openuv",
                        "{endpoint}: attempt {attempt}/{max_attempts} failed ({err}), retrying in {}ms...",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorKind, session::TransportError};
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    fn timeout(endpoint: &str) -> Error {
        crate::error::classify_transport(endpoint, TransportError::Timeout(None))
    }

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Backoff::Constant(Duration::from_millis(1)))
    }

    #[test]
    fn exponential_delays_double_and_cap() {
        let policy = RetryPolicy::new(
            10,
            Backoff::Exponential {
                initial: Duration::from_millis(100),
                max: Duration::from_millis(500),
            },
        );
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(64), Duration::from_millis(500));
    }

    #[test]
    fn constant_delay_never_changes() {
        let policy = RetryPolicy::new(3, Backoff::Constant(Duration::from_millis(250)));
        assert_eq!(policy.delay_for(1), policy.delay_for(3));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = quick(3)
            .run("uv", || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(timeout("uv"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_attempts_and_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let err = quick(4)
            .run("forecast", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(timeout("forecast"))
                }
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn non_retriable_error_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let err = quick(5)
            .run("uv", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(
                        crate::error::classify_response("uv", reqwest::StatusCode::FORBIDDEN, "")
                            .unwrap(),
                    )
                }
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidApiKey);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let _ = quick(0)
            .run("uv", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(timeout("uv"))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
