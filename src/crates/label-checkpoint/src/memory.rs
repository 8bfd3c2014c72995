//! In-memory checkpoint storage for tests and dry runs.

use crate::checkpoint::Checkpoint;
use crate::error::{CheckpointError, Result};
use crate::traits::CheckpointStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Checkpoint store that keeps the latest checkpoint in memory.
///
/// Cloning shares the underlying slot. Saves can be made to fail on demand
/// to exercise error paths.
#[derive(Debug)]
pub struct InMemoryStore<F, S> {
    slot: Arc<RwLock<Option<Checkpoint<F, S>>>>,
    saves: Arc<AtomicUsize>,
    fail_saves: Arc<AtomicBool>,
}

impl<F, S> Clone for InMemoryStore<F, S> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            saves: Arc::clone(&self.saves),
            fail_saves: Arc::clone(&self.fail_saves),
        }
    }
}

impl<F, S> Default for InMemoryStore<F, S> {
    fn default() -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
            saves: Arc::new(AtomicUsize::new(0)),
            fail_saves: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl<F, S> InMemoryStore<F, S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a checkpoint
    pub fn with_checkpoint(checkpoint: Checkpoint<F, S>) -> Self {
        let store = Self::default();
        *store.slot.write() = Some(checkpoint);
        store
    }

    /// Number of successful saves so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make subsequent saves fail (or succeed again)
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl<F: Clone, S: Clone> InMemoryStore<F, S> {
    /// Copy of the stored checkpoint
    pub fn snapshot(&self) -> Option<Checkpoint<F, S>> {
        self.slot.read().clone()
    }
}

#[async_trait]
impl<F, S> CheckpointStore<F, S> for InMemoryStore<F, S>
where
    F: Serialize + DeserializeOwned + Send + Sync + Clone,
    S: Serialize + DeserializeOwned + Send + Sync + Clone,
{
    async fn load(&self) -> Result<Option<Checkpoint<F, S>>> {
        Ok(self.slot.read().clone())
    }

    async fn save(&self, checkpoint: &Checkpoint<F, S>) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CheckpointError::Storage("saves disabled".to_string()));
        }
        *self.slot.write() = Some(checkpoint.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.slot.write() = None;
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
