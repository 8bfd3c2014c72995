//! Storage abstraction and compatibility checks.

use crate::checkpoint::{Checkpoint, ValidateState};
use crate::error::{CheckpointError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, warn};

/// Durable home of a single job's checkpoint.
///
/// A store holds at most one checkpoint; `save` replaces it. Implementations
/// must make `save` all-or-nothing: a crash mid-save leaves either the old or
/// the new checkpoint, never a torn one.
#[async_trait]
pub trait CheckpointStore<F, S>: Send + Sync
where
    F: Serialize + DeserializeOwned + Send + Sync,
    S: Serialize + DeserializeOwned + Send + Sync,
{
    /// Load the stored checkpoint, `None` when nothing was saved yet
    async fn load(&self) -> Result<Option<Checkpoint<F, S>>>;

    /// Replace the stored checkpoint
    async fn save(&self, checkpoint: &Checkpoint<F, S>) -> Result<()>;

    /// Remove the stored checkpoint, if any
    async fn clear(&self) -> Result<()>;

    /// Human-readable location for logs
    fn location(&self) -> String;
}

/// Result of [`load_compatible`].
#[derive(Debug)]
pub enum LoadOutcome<F, S> {
    /// Nothing stored
    Absent,

    /// Checkpoint matches the current configuration and may be resumed
    Compatible(Checkpoint<F, S>),

    /// Checkpoint is readable but belongs to a different configuration or format
    Incompatible(String),

    /// Checkpoint could not be read or is internally inconsistent
    Unreadable(String),
}

impl<F, S> LoadOutcome<F, S> {
    pub fn is_compatible(&self) -> bool {
        matches!(self, LoadOutcome::Compatible(_))
    }

    /// Consume the outcome, keeping only a resumable checkpoint
    pub fn into_checkpoint(self) -> Option<Checkpoint<F, S>> {
        match self {
            LoadOutcome::Compatible(checkpoint) => Some(checkpoint),
            _ => None,
        }
    }
}

/// Load a checkpoint and decide whether it can be resumed.
///
/// Never fails: read errors, format mismatches, invariant violations and
/// fingerprint mismatches are all reported through [`LoadOutcome`].
pub async fn load_compatible<F, S>(
    store: &dyn CheckpointStore<F, S>,
    expected: &F,
) -> LoadOutcome<F, S>
where
    F: Serialize + DeserializeOwned + Send + Sync + PartialEq + Debug,
    S: Serialize + DeserializeOwned + Send + Sync + ValidateState,
{
    let checkpoint = match store.load().await {
        Ok(Some(checkpoint)) => checkpoint,
        Ok(None) => {
            debug!(location = %store.location(), "No checkpoint found");
            return LoadOutcome::Absent;
        }
        Err(CheckpointError::VersionMismatch { found, expected }) => {
            let reason = format!(
                "written with format version {} (current is {})",
                found, expected
            );
            warn!(location = %store.location(), %reason, "Ignoring checkpoint");
            return LoadOutcome::Incompatible(reason);
        }
        Err(e) => {
            warn!(location = %store.location(), error = %e, "Checkpoint is unreadable");
            return LoadOutcome::Unreadable(e.to_string());
        }
    };

    if let Err(violation) = checkpoint.state.validate() {
        warn!(location = %store.location(), %violation, "Checkpoint state is corrupt");
        return LoadOutcome::Unreadable(format!("corrupt state: {}", violation));
    }

    if &checkpoint.fingerprint != expected {
        let reason = format!(
            "configuration changed since the checkpoint was written (stored {:?})",
            checkpoint.fingerprint
        );
        warn!(location = %store.location(), "Checkpoint belongs to a different configuration");
        return LoadOutcome::Incompatible(reason);
    }

    LoadOutcome::Compatible(checkpoint)
}
