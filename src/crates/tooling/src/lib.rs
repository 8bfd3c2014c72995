//! Tooling utilities shared across the labeler workspace
//!
//! # Modules
//!
//! - `async_utils` - Fixed-delay retry with a deterministic fallback value
//! - `config` - Environment variable loading with proper error handling
//! - `logging` - Subscriber setup and human-readable formatting helpers

pub mod async_utils;
pub mod config;
pub mod logging;

use thiserror::Error;

/// Errors that can occur in the tooling crate
#[derive(Debug, Error)]
pub enum ToolingError {
    /// General error with message
    #[error("Tooling error: {0}")]
    General(String),

    /// Logging subscriber could not be installed
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Result type for tooling operations
pub type Result<T> = std::result::Result<T, ToolingError>;

/// Get version information
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let v = version();
        assert!(!v.is_empty());
    }

    #[test]
    fn test_error_display() {
        let err = ToolingError::General("boom".to_string());
        assert_eq!(err.to_string(), "Tooling error: boom");
    }
}
