//! The checkpoint envelope.
//!
//! A [`Checkpoint`] wraps an arbitrary job state `S` together with the
//! fingerprint `F` of the configuration that produced it. The fingerprint is
//! compared against the current run before the state is trusted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current on-disk format version.
///
/// Bump whenever the envelope or a state type changes incompatibly.
pub const FORMAT_VERSION: u32 = 1;

/// Durable snapshot of job progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint<F, S> {
    /// Format version the checkpoint was written with
    pub format_version: u32,

    /// Identifier of the run that first created this state
    pub run_id: Uuid,

    /// Configuration identity the state belongs to
    pub fingerprint: F,

    /// When the checkpoint was written
    pub written_at: DateTime<Utc>,

    /// Job state
    pub state: S,
}

impl<F, S> Checkpoint<F, S> {
    /// Create a checkpoint for a new run
    pub fn new(fingerprint: F, state: S) -> Self {
        Self::for_run(Uuid::new_v4(), fingerprint, state)
    }

    /// Create a checkpoint for an existing run
    pub fn for_run(run_id: Uuid, fingerprint: F, state: S) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            run_id,
            fingerprint,
            written_at: Utc::now(),
            state,
        }
    }

    /// Age of the checkpoint relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.written_at
    }
}

/// State that can check its own internal consistency.
///
/// A checkpoint whose state fails validation is treated as corrupt and never
/// resumed.
pub trait ValidateState {
    fn validate(&self) -> std::result::Result<(), String>;
}
