//! Fixed-delay retries that degrade to a fallback value
//!
//! A labeling question must always end with an answer, so exhausting the
//! attempts is not an error: the caller's fallback comes back tagged with
//! [`RetryStatus::FellBack`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// How many times to ask, and how long to wait in between
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first), never zero
    pub max_attempts: usize,

    /// Delay between two consecutive attempts
    pub delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first try; zero is bumped to one
    ///
    /// ```rust
    /// use tooling::async_utils::retry::RetryPolicy;
    ///
    /// assert_eq!(RetryPolicy::new(0).max_attempts, 1);
    /// ```
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Duration::from_secs(1),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Another attempt is allowed after `attempts` tries
    pub fn should_retry(&self, attempts: usize) -> bool {
        attempts < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// How the value of a [`RetryOutcome`] was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryStatus {
    /// One of the attempts succeeded
    Succeeded,

    /// Every attempt failed and the fallback value was used
    FellBack {
        /// Message of the last error seen
        last_error: String,
    },
}

/// Result of [`retry_with_fallback`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T> {
    /// The produced or fallback value
    pub value: T,

    /// Number of attempts made
    pub attempts: usize,

    /// Whether the value came from the operation or the fallback
    pub status: RetryStatus,
}

impl<T> RetryOutcome<T> {
    /// True when the value is the fallback
    pub fn fell_back(&self) -> bool {
        matches!(self.status, RetryStatus::FellBack { .. })
    }
}

/// Run `operation` until it succeeds or `policy` runs out, then hand back `fallback`
///
/// `policy.delay` is slept between attempts only, never after the last one.
///
/// ```rust,ignore
/// let outcome = retry_with_fallback(&policy, || ask(&question), Label::Negative).await;
/// if outcome.fell_back() { /* counted, not cached */ }
/// ```
pub async fn retry_with_fallback<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation: F,
    fallback: T,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    retry_with_fallback_when(policy, operation, fallback, |_: &E| true).await
}

/// [`retry_with_fallback`] that stops early once `retryable` rejects an error
pub async fn retry_with_fallback_when<F, Fut, T, E, R>(
    policy: &RetryPolicy,
    mut operation: F,
    fallback: T,
    retryable: R,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
    R: Fn(&E) -> bool,
{
    let mut attempts = 0;
    let mut last_error = String::new();

    while policy.should_retry(attempts) {
        if attempts > 0 {
            debug!(attempt = attempts + 1, delay = ?policy.delay, "Waiting before retry");
            sleep(policy.delay).await;
        }

        attempts += 1;
        match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(attempts, "Retry succeeded");
                }
                return RetryOutcome {
                    value,
                    attempts,
                    status: RetryStatus::Succeeded,
                };
            }
            Err(error) => {
                debug!(
                    attempt = attempts,
                    max_attempts = policy.max_attempts,
                    error = %error,
                    "Attempt failed"
                );
                last_error = error.to_string();
                if !retryable(&error) {
                    debug!(attempt = attempts, "Error is permanent, not retrying");
                    break;
                }
            }
        }
    }

    warn!(
        attempts,
        error = %last_error,
        "All attempts failed, using fallback value"
    );

    RetryOutcome {
        value: fallback,
        attempts,
        status: RetryStatus::FellBack { last_error },
    }
}
