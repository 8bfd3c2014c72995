//! # Labeler
//!
//! Checkpointed, quota-bounded labeling jobs over CSV datasets.
//!
//! Each record is sent to a binary classifier once per category. A job
//! survives interruption without losing or repeating work, avoids repeated
//! classifier calls for identical text, and in exploration mode stops as soon
//! as every category has its target number of positive and negative examples.
//!
//! ## Architecture
//!
//! - [`engine::JobEngine`] owns the [`models::JobState`] and drives the job
//! - [`classify::ClassificationService`] wraps the classifier with a
//!   [`cache::ResponseCache`] and a fixed-delay retry policy
//! - [`sampling`] decides traversal order, [`quota`] decides what to keep
//! - Checkpoints are stored through `label_checkpoint::CheckpointStore`
//!
//! ```rust,no_run
//! use labeler::{ClassificationService, EngineSettings, JobConfig, JobEngine, ResumeChoice};
//! use label_checkpoint::JsonFileStore;
//! use llm::local::OllamaClassifier;
//! use std::sync::Arc;
//!
//! # async fn example(config: JobConfig, records: Vec<labeler::Record>) -> anyhow::Result<()> {
//! let classifier = Arc::new(OllamaClassifier::new(config.classifier.clone())?);
//! let service = Arc::new(ClassificationService::new(
//!     classifier,
//!     config.execution.cache_size,
//!     config.retry_policy(),
//! ));
//! let store = Arc::new(JsonFileStore::<labeler::JobFingerprint, labeler::JobState>::new(
//!     config.checkpoint_path(),
//! ));
//! let settings = EngineSettings::from_config(&config, config.output_path(chrono::Local::now()));
//!
//! let engine = JobEngine::new(records, config.resolved_categories(), service, store, settings);
//! let report = engine.run(ResumeChoice::Resume).await?;
//! println!("{} results, stopped: {}", report.recorded, report.reason);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod catalog;
pub mod classify;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod input;
pub mod models;
pub mod output;
pub mod quota;
pub mod sampling;
pub mod shutdown;

pub use cache::{CacheKey, CacheMetrics, ResponseCache};
pub use classify::{ClassificationService, LabelSource, RecordLabels, FALLBACK_LABEL};
pub use config::{CategoryConfig, ConfigLoader, JobConfig};
pub use engine::{CategoryReport, EngineSettings, JobEngine, JobReport, JobStore, ResumeChoice};
pub use error::{LabelerError, Result};
pub use events::{EventSink, JobEvent, JobPhase, RecordOutcome, TerminationReason};
pub use models::{
    Category, JobFingerprint, JobState, LabelCounts, LabelResult, Record, SamplingMode,
    SkipReason, SkippedRecord,
};
pub use quota::{QuotaController, Verdict};
pub use shutdown::ShutdownCoordinator;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
