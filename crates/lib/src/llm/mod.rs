//! LLM provider abstraction.
//!
//! One request/response contract for every backend; dispatch depends only on
//! the [`Provider`] trait. Adding a backend means adding one client module
//! and one arm in [`provider_for`].

mod ollama;
mod openai_compat;

pub use ollama::OllamaClient;
pub use openai_compat::OpenAiCompatClient;

use crate::config::{ProviderConfig, ProviderKind};
use async_trait::async_trait;
use std::time::Duration;

/// One prompt for the backend, built per invocation by dispatch.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub prompt: String,
    pub system: String,
    pub timeout: Duration,
}

/// Generated text on success.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
}

/// Classified provider failure. Raw detail stays on this side of the radio:
/// these strings are for logs, never for the mesh.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("llm request timed out")]
    Timeout,
    #[error("llm endpoint unreachable: {0}")]
    Connection(String),
    #[error("llm api error: {0}")]
    Api(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_connect() {
            ProviderError::Connection(e.to_string())
        } else {
            ProviderError::Api(e.to_string())
        }
    }
}

/// A backend that can answer one prompt.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short backend name for logging.
    fn name(&self) -> &'static str;

    /// Issue the request and return the generated text. Never panics past
    /// this boundary; every failure is a classified [`ProviderError`].
    async fn send(&self, request: &LlmRequest) -> Result<LlmResponse, ProviderError>;
}

/// Select the provider client once per process from config.
pub fn provider_for(config: &ProviderConfig) -> Box<dyn Provider> {
    match config.kind {
        ProviderKind::OpenaiCompat => Box::new(OpenAiCompatClient::new(
            config.endpoint.clone(),
            config.api_key.clone(),
        )),
        ProviderKind::Ollama => Box::new(OllamaClient::new(
            config.endpoint.clone(),
            config.api_key.clone(),
        )),
    }
}
