//! Ollama classifier adapter.
//!
//! Sends one non-streaming chat request per classification to a local Ollama
//! server and parses the free-text answer into a [`Label`].
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::local::OllamaClassifier;
//! use llm::{BinaryClassifier, ClassificationRequest, LocalLlmConfig};
//!
//! let classifier = OllamaClassifier::new(LocalLlmConfig::default())?;
//! let label = classifier
//!     .classify(&ClassificationRequest {
//!         text: "Teslimat çok hızlıydı",
//!         category: "Teslimat",
//!         description: "Siparişin adrese ulaştırılması süreci",
//!     })
//!     .await?;
//! ```

use crate::classifier::{build_prompt, parse_binary_answer, BinaryClassifier, ClassificationRequest, Label};
use crate::config::LocalLlmConfig;
use crate::error::{LlmError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ollama-backed binary classifier.
#[derive(Clone)]
pub struct OllamaClassifier {
    config: LocalLlmConfig,
    client: Client,
}

impl OllamaClassifier {
    /// Create a new classifier with the given configuration.
    pub fn new(config: LocalLlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| LlmError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Check if the Ollama server is running.
    pub async fn check_health(&self) -> bool {
        match self.client.get(self.config.endpoint("/api/tags")).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    pub fn config(&self) -> &LocalLlmConfig {
        &self.config
    }

    fn build_request(&self, request: &ClassificationRequest<'_>) -> OllamaRequest {
        OllamaRequest {
            model: self.config.model.clone(),
            messages: vec![OllamaMessage {
                role: "user".to_string(),
                content: build_prompt(request),
            }],
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        }
    }

    fn convert_response(response: OllamaResponse) -> Result<Label> {
        parse_binary_answer(&response.message.content).ok_or_else(|| {
            LlmError::InvalidResponse(format!("empty answer from model {}", response.model))
        })
    }
}

#[async_trait]
impl BinaryClassifier for OllamaClassifier {
    async fn classify(&self, request: &ClassificationRequest<'_>) -> Result<Label> {
        let body = self.build_request(request);

        let response = self
            .client
            .post(self.config.endpoint("/api/chat"))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(e.to_string())
                } else if e.is_connect() {
                    LlmError::ServiceUnavailable(e.to_string())
                } else {
                    LlmError::HttpError(e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LlmError::ModelNotFound(self.config.model.clone()));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::ProviderError(format!(
                "Ollama API error {}: {}",
                status, error_text
            )));
        }

        let ollama_resp: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let label = Self::convert_response(ollama_resp)?;
        debug!(category = request.category, %label, "Ollama answered");
        Ok(label)
    }

    fn name(&self) -> String {
        format!("ollama:{}", self.config.model)
    }
}

// Ollama API types
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    model: String,
    message: OllamaMessage,
}
