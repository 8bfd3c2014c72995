//! Failures a classifier backend can report.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

/// Why a single labeling question produced no label.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport-level failure talking to the backend.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Request or reply body was not valid JSON for the expected shape.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Backend does not have the configured model pulled.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Backend unreachable (e.g., Ollama not running).
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The backend answered but the answer could not be turned into a label.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Backend replied with a non-success status.
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Client could not be built from the given settings.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl LlmError {
    /// Worth another attempt under the retry policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::HttpError(_)
                | LlmError::ServiceUnavailable(_)
                | LlmError::Timeout(_)
                | LlmError::InvalidResponse(_)
        )
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::SerializationError(err.to_string())
    }
}
