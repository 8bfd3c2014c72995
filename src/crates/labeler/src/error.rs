//! Error types for labeling jobs
//!
//! Only job-level fatal conditions surface as [`LabelerError`]: invalid
//! configuration, unreadable input and failure to write the final output.
//! Classifier failures and checkpoint problems are absorbed by the engine.

use thiserror::Error;

/// Result type alias for labeler operations
pub type Result<T> = std::result::Result<T, LabelerError>;

/// Main error type for labeler operations
#[derive(Error, Debug)]
pub enum LabelerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input dataset could not be read
    #[error("Input error: {0}")]
    Input(String),

    /// Final output could not be written
    #[error("Output error: {0}")]
    Output(String),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Checkpoint storage error
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] label_checkpoint::CheckpointError),

    /// Classifier setup error
    #[error("Classifier error: {0}")]
    Classifier(#[from] llm::LlmError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tooling::ToolingError> for LabelerError {
    fn from(err: tooling::ToolingError) -> Self {
        LabelerError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for LabelerError {
    fn from(err: toml::de::Error) -> Self {
        LabelerError::Config(err.to_string())
    }
}

impl From<serde_yaml::Error> for LabelerError {
    fn from(err: serde_yaml::Error) -> Self {
        LabelerError::Config(err.to_string())
    }
}
