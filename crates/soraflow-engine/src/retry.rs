//! Transient-vs-permanent retry classification
//!
//! Wraps a single fallible remote call. Errors whose code is in the
//! policy's transient set are retried until a wall-clock deadline; all
//! other errors surface immediately. Classification, not attempt count,
//! gates retry.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{ApiError, EngineError, Result};

/// Sleep schedule between attempts.
///
/// A multiplier of 1.0 gives a fixed interval; anything above grows the
/// delay up to `max_delay`.
#[derive(Debug, Clone)]
pub struct Backoff {
    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Ceiling the delay never exceeds
    pub max_delay: Duration,

    /// Growth factor applied per attempt
    pub multiplier: f64,
}

impl Backoff {
    /// Fixed interval between attempts
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
        }
    }

    /// Doubling interval, capped at `max_delay`
    pub fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier: 2.0,
        }
    }

    /// Delay before the retry following the given zero-based attempt
    pub fn delay(&self, attempt: u32) -> Duration {
        let mut delay = self.initial_delay;
        for _ in 0..attempt {
            if delay >= self.max_delay {
                return self.max_delay;
            }
            delay = delay.mul_f64(self.multiplier);
        }
        delay.min(self.max_delay)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Which remote errors are worth retrying, and for how long.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Provider error codes classified as transient
    pub transient_codes: HashSet<String>,

    /// Wall-clock budget for the whole operation, retries included
    pub deadline: Duration,

    /// Sleep schedule between attempts
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new<C>(transient_codes: C, deadline: Duration) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            transient_codes: transient_codes.into_iter().map(Into::into).collect(),
            deadline,
            backoff: Backoff::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Whether the policy classifies this error as safe to retry
    pub fn is_transient(&self, error: &ApiError) -> bool {
        self.transient_codes.contains(&error.code)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            transient_codes: HashSet::new(),
            deadline: Duration::from_secs(60),
            backoff: Backoff::default(),
        }
    }
}

/// Run `call` until it succeeds, its error is classified permanent, or the
/// wall-clock deadline elapses.
///
/// Classification is evaluated on every attempt, including the first: a
/// permanent error returns after exactly one invocation. The provider's
/// "not found" condition is surfaced as [`EngineError::NotFound`] so
/// callers can special-case it (read: clear state, delete: success).
/// The deadline is checked before sleeping, so the call never overruns it
/// by more than one backoff interval.
pub async fn with_retry<T, F, Fut>(op: &str, policy: &RetryPolicy, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, ApiError>>,
{
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        let err = match call().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if err.is_not_found() {
            return Err(EngineError::NotFound {
                op: op.to_string(),
                source: err,
            });
        }

        if !policy.is_transient(&err) {
            return Err(EngineError::Remote {
                op: op.to_string(),
                source: err,
            });
        }

        let delay = policy.backoff.delay(attempt);
        if started.elapsed() + delay >= policy.deadline {
            return Err(EngineError::DeadlineElapsed {
                op: op.to_string(),
                deadline: policy.deadline,
                attempts: attempt + 1,
                source: err,
            });
        }

        tracing::debug!(
            op,
            code = %err.code,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "transient error, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transient() -> ApiError {
        ApiError::new("InternalError", "momentary hiccup").with_status(500)
    }

    fn policy(deadline: Duration) -> RetryPolicy {
        RetryPolicy::new(["InternalError"], deadline).with_backoff(Backoff::fixed(Duration::from_secs(3)))
    }

    #[test]
    fn test_backoff_growth_and_cap() {
        let backoff = Backoff::exponential(Duration::from_secs(1), Duration::from_secs(8));
        assert_eq!(backoff.delay(0), Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_secs(2));
        assert_eq!(backoff.delay(3), Duration::from_secs(8));
        assert_eq!(backoff.delay(30), Duration::from_secs(8));

        let fixed = Backoff::fixed(Duration::from_secs(5));
        assert_eq!(fixed.delay(0), Duration::from_secs(5));
        assert_eq!(fixed.delay(7), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_returns_after_one_attempt() {
        let mut attempts = 0;
        let result: Result<()> = with_retry("create server", &policy(Duration::from_secs(60)), || {
            attempts += 1;
            async { Err(ApiError::new("InvalidParameter", "flavor unknown").with_status(400)) }
        })
        .await;

        assert_eq!(attempts, 1);
        assert!(matches!(result, Err(EngineError::Remote { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_retried_until_success() {
        let mut attempts = 0;
        let result = with_retry("read server", &policy(Duration::from_secs(60)), || {
            attempts += 1;
            let outcome = if attempts < 4 { Err(transient()) } else { Ok(attempts) };
            async move { outcome }
        })
        .await
        .unwrap();

        assert_eq!(result, 4);
        assert_eq!(attempts, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_transient_retries() {
        // Fixed 3s backoff against a 10s deadline: attempts at t=0, 3, 6, 9;
        // the next sleep would end at t=12, so the fourth error is the last.
        let mut attempts = 0;
        let result: Result<()> = with_retry("read server", &policy(Duration::from_secs(10)), || {
            attempts += 1;
            async { Err(transient()) }
        })
        .await;

        assert_eq!(attempts, 4);
        match result {
            Err(EngineError::DeadlineElapsed { attempts: reported, .. }) => assert_eq!(reported, 4),
            other => panic!("expected DeadlineElapsed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_distinguished() {
        let mut attempts = 0;
        let result: Result<()> = with_retry("delete server", &policy(Duration::from_secs(60)), || {
            attempts += 1;
            async { Err(ApiError::new("NoSuchResource", "gone").with_status(404)) }
        })
        .await;

        assert_eq!(attempts, 1);
        assert!(matches!(result, Err(EngineError::NotFound { .. })));
    }
}
