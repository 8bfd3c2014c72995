//! CLI command implementations
//!
//! Provides command handlers for the labeler binary.

pub mod categories;
pub mod progress;
pub mod prompt;
pub mod run;
pub mod status;

pub use run::{apply_options, RunOptions};

use crate::config::ConfigLoader;
use crate::config::JobConfig;
use crate::error::Result;
use std::path::Path;

/// Load layered configuration, with an optional explicit file on top
pub async fn load_config(explicit: Option<&Path>) -> Result<JobConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = explicit {
        loader = loader.with_explicit(path);
    }
    loader.load().await
}
