//! Adapters for LLM servers running on localhost or the local network.

pub mod ollama;

pub use ollama::OllamaClassifier;
