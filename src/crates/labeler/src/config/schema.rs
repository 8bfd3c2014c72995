//! Configuration schema for labeling jobs

use crate::error::{LabelerError, Result};
use crate::models::{Category, SamplingMode};
use crate::output;
use chrono::{DateTime, Local};
use llm::LocalLlmConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tooling::async_utils::retry::RetryPolicy;

/// Main job configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct JobConfig {
    /// Categories to label
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,

    /// Default quota for categories without their own targets
    #[serde(default)]
    pub targets: TargetConfig,

    /// Traversal configuration
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Classifier retry configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Checkpoint configuration
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Execution configuration
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Input CSV configuration
    #[serde(default)]
    pub input: InputConfig,

    /// Output CSV configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// Classifier endpoint
    #[serde(default)]
    pub classifier: LocalLlmConfig,
}

/// One category as written in configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryConfig {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Overrides `targets.positive`
    #[serde(default)]
    pub target_positive: Option<usize>,

    /// Overrides `targets.negative`
    #[serde(default)]
    pub target_negative: Option<usize>,
}

impl CategoryConfig {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            target_positive: None,
            target_negative: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TargetConfig {
    pub positive: usize,
    pub negative: usize,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            positive: 50,
            negative: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SamplingConfig {
    #[serde(default)]
    pub mode: SamplingMode,

    /// Shuffle seed; random when unset
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Total attempts per (record, category), including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Fixed delay between attempts
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointConfig {
    /// Checkpoint file; `<output.dir>/<slug>_checkpoint.json` when unset
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Save after this many newly processed records
    #[serde(default = "default_checkpoint_every")]
    pub every: usize,

    /// Keep the checkpoint file after a completed job
    #[serde(default = "default_keep")]
    pub keep: bool,
}

fn default_checkpoint_every() -> usize {
    5
}

fn default_keep() -> bool {
    true
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            path: None,
            every: default_checkpoint_every(),
            keep: default_keep(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionConfig {
    /// Maximum in-flight classifications
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Response cache entries; 0 disables the cache
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
}

fn default_concurrency() -> usize {
    1
}

fn default_cache_size() -> usize {
    1000
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            cache_size: default_cache_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputConfig {
    #[serde(default = "default_text_column")]
    pub text_column: String,

    /// Optional; records carry no date when the column is absent
    #[serde(default = "default_date_column")]
    pub date_column: String,
}

fn default_text_column() -> String {
    "text".to_string()
}

fn default_date_column() -> String {
    "date".to_string()
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            text_column: default_text_column(),
            date_column: default_date_column(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Directory for timestamped result files and default checkpoints
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Exact output file, overriding the timestamped name
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            path: None,
        }
    }
}

impl JobConfig {
    /// Categories with targets filled in from the defaults
    pub fn resolved_categories(&self) -> Vec<Category> {
        self.categories
            .iter()
            .map(|c| Category {
                name: c.name.trim().to_string(),
                description: c.description.trim().to_string(),
                target_positive: c.target_positive.unwrap_or(self.targets.positive),
                target_negative: c.target_negative.unwrap_or(self.targets.negative),
            })
            .collect()
    }

    /// Check configuration invariants
    pub fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(LabelerError::Config(
                "at least one category is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for category in &self.categories {
            let name = category.name.trim();
            if name.is_empty() {
                return Err(LabelerError::Config("category names must not be empty".to_string()));
            }
            if !seen.insert(name.to_string()) {
                return Err(LabelerError::Config(format!(
                    "duplicate category name '{}'",
                    name
                )));
            }
        }

        if self.execution.concurrency == 0 {
            return Err(LabelerError::Config("concurrency must be at least 1".to_string()));
        }
        if self.checkpoint.every == 0 {
            return Err(LabelerError::Config(
                "checkpoint.every must be at least 1".to_string(),
            ));
        }
        if self.retry.max_retries == 0 {
            return Err(LabelerError::Config(
                "retry.max_retries must be at least 1".to_string(),
            ));
        }
        if self.input.text_column.trim().is_empty() {
            return Err(LabelerError::Config("input.text_column must not be empty".to_string()));
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry.max_retries)
            .with_delay(Duration::from_millis(self.retry.retry_delay_ms))
    }

    /// Name stem shared by output and checkpoint files
    pub fn file_stem(&self) -> String {
        match self.categories.as_slice() {
            [only] => output::slug(only.name.trim()),
            _ => "labels".to_string(),
        }
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint.path.clone().unwrap_or_else(|| {
            self.output
                .dir
                .join(format!("{}_checkpoint.json", self.file_stem()))
        })
    }

    pub fn output_path(&self, now: DateTime<Local>) -> PathBuf {
        self.output.path.clone().unwrap_or_else(|| {
            self.output.dir.join(format!(
                "{}_{}.csv",
                self.file_stem(),
                now.format("%Y%m%d_%H%M")
            ))
        })
    }
}
