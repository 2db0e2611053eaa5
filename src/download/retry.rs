//! Exponential backoff with jitter for transient archive failures.
//!
//! The Wayback Machine throttles aggressively and drops connections under
//! load, so every request in a run goes through a [`RetryPolicy`]. A failed
//! attempt is retried after
//!
//! ```text
//! delay = min(base_delay * 2^attempt, max_delay) ± 20%
//! ```
//!
//! where `attempt` is the zero-based index of the attempt that just failed.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use wayback_core::download::{RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::new(2, Duration::from_millis(100), Duration::from_secs(1));
//! assert_eq!(policy.max_attempts(), 3);
//!
//! match policy.should_retry(0) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         assert_eq!(attempt, 1);
//!         assert!(delay <= Duration::from_millis(120));
//!     }
//!     RetryDecision::DoNotRetry { .. } => unreachable!(),
//! }
//! assert!(matches!(policy.should_retry(2), RetryDecision::DoNotRetry { .. }));
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default base delay for exponential backoff (1 second).
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap (30 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Jitter spread as a fraction of the capped delay.
const JITTER_FRACTION: f64 = 0.2;

/// Decision on whether to retry a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Index of the upcoming attempt (the first retry is attempt 1).
        attempt: u32,
    },

    /// Give up and surface the last error.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Retry configuration with exponential backoff.
///
/// # Default Values
///
/// - `retries`: 5 (six attempts in total)
/// - `base_delay`: 1 second
/// - `max_delay`: 30 seconds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    retries: u32,

    /// Delay before the first retry.
    base_delay: Duration,

    /// Maximum delay cap.
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with custom settings.
    #[must_use]
    pub fn new(retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            retries,
            base_delay,
            max_delay,
        }
    }

    /// Creates a policy with a custom retry count and default delays.
    #[must_use]
    pub fn with_retries(retries: u32) -> Self {
        Self {
            retries,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Total attempts, including the first one.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    #[must_use]
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Decides whether to retry after the zero-based `attempt` failed.
    #[instrument(skip(self), fields(retries = self.retries))]
    pub fn should_retry(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.retries {
            debug!(attempt, "retries exhausted");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts()),
            };
        }

        let delay = self.calculate_delay(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Backoff delay for `attempt` before jitter: `min(base * 2^attempt, max)`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_secs = self.base_delay.as_secs_f64() * 2f64.powi(exponent);
        let capped = delay_secs.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            Duration::ZERO
        }
    }

    /// Backoff delay with uniform jitter in ±20% of the delay, floored at zero.
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let capped = self.backoff_delay(attempt).as_secs_f64();
        if capped <= 0.0 {
            return Duration::ZERO;
        }
        let spread = capped * JITTER_FRACTION;
        let jitter = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_secs_f64((capped + jitter).max(0.0))
    }

    /// Runs `operation` until it succeeds or the policy gives up.
    ///
    /// `on_retry` is called with the failed attempt's error and the one-based
    /// retry number before each backoff sleep. On exhaustion the error of the
    /// final attempt is returned.
    pub async fn run<T, E, F, Fut, R>(&self, mut operation: F, mut on_retry: R) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: FnMut(&E, u32),
    {
        let mut attempt = 0;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            match self.should_retry(attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    on_retry(&err, next);
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(%reason, "giving up");
                    return Err(err);
                }
            }
        }
    }
}
