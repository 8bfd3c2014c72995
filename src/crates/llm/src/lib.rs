//! Binary classifier port for the labeler.
//!
//! The engine depends only on the [`BinaryClassifier`] trait. This crate
//! defines the trait, the [`Label`] type it returns, and adapters for local
//! LLM servers.
//!
//! # Local Adapters
//!
//! - **Ollama** - chat endpoint of a local Ollama server
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use llm::local::OllamaClassifier;
//! use llm::{BinaryClassifier, ClassificationRequest, LocalLlmConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LocalLlmConfig::new("http://localhost:11434", "gemma2:9b");
//!     let classifier = OllamaClassifier::new(config)?;
//!
//!     let label = classifier
//!         .classify(&ClassificationRequest {
//!             text: "Uygulama çok kolay kullanılıyor",
//!             category: "Kullanıcı Dostu Arayüz",
//!             description: "Kullanım kolaylığı ve anlaşılırlık",
//!         })
//!         .await?;
//!     println!("label: {}", label);
//!     Ok(())
//! }
//! ```

pub mod classifier;
pub mod config;
pub mod error;

#[cfg(feature = "local")]
pub mod local;

pub use classifier::{
    build_prompt, parse_binary_answer, BinaryClassifier, ClassificationRequest, Label,
};
pub use config::LocalLlmConfig;
pub use error::{LlmError, Result};
