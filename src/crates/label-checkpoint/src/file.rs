//! JSON file checkpoint storage.
//!
//! Writes are atomic: the checkpoint is serialized to `<path>.tmp`, flushed to
//! disk, then renamed over `<path>`. A reader therefore sees either the
//! previous checkpoint or the new one.

use crate::checkpoint::{Checkpoint, FORMAT_VERSION};
use crate::error::{CheckpointError, Result};
use crate::traits::CheckpointStore;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Checkpoint store backed by a single pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore<F, S> {
    path: PathBuf,
    _marker: PhantomData<fn() -> (F, S)>,
}

impl<F, S> JsonFileStore<F, S> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        temp_path_for(&self.path)
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write `bytes` to `path` atomically via a sibling temp file.
///
/// Creates the parent directory if needed.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let tmp_path = temp_path_for(path);

    let mut file = fs::File::create(&tmp_path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl<F, S> CheckpointStore<F, S> for JsonFileStore<F, S>
where
    F: Serialize + DeserializeOwned + Send + Sync,
    S: Serialize + DeserializeOwned + Send + Sync,
{
    async fn load(&self) -> Result<Option<Checkpoint<F, S>>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // Check the version before committing to the state's shape
        let raw: serde_json::Value = serde_json::from_slice(&bytes)?;
        let found = raw
            .get("format_version")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| CheckpointError::Invalid("missing format_version".to_string()))?;
        if found != u64::from(FORMAT_VERSION) {
            return Err(CheckpointError::VersionMismatch {
                found: u32::try_from(found).unwrap_or(u32::MAX),
                expected: FORMAT_VERSION,
            });
        }

        let checkpoint = serde_json::from_value(raw)?;
        debug!(path = %self.path.display(), "Loaded checkpoint");
        Ok(Some(checkpoint))
    }

    async fn save(&self, checkpoint: &Checkpoint<F, S>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        write_atomic(&self.path, &bytes).await?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "Saved checkpoint");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        for path in [self.path.clone(), self.temp_path()] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
