//! Async utilities for common async patterns
//!
//! Retries with a fixed delay between attempts. Callers that must always make
//! progress use [`retry::retry_with_fallback`], which never returns an error
//! and instead reports how the value was obtained.
//!
//! # Example
//!
//! ```rust,ignore
//! use tooling::async_utils::retry::{retry_with_fallback, RetryPolicy};
//! use std::time::Duration;
//!
//! async fn call_backend() -> Result<u8, String> {
//!     Ok(1)
//! }
//!
//! let policy = RetryPolicy::new(3).with_delay(Duration::from_secs(1));
//! let outcome = retry_with_fallback(&policy, || call_backend(), 0).await;
//! if outcome.fell_back() {
//!     tracing::warn!(attempts = outcome.attempts, "using fallback");
//! }
//! ```

pub mod retry;
