//! Ollama API client (http://127.0.0.1:11434 by default).
//!
//! Uses the single-turn /api/generate endpoint: the bridge sends one prompt
//! per invocation and only needs the `response` text back.

use crate::llm::{LlmRequest, LlmResponse, Provider, ProviderError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const GENERATE_PATH: &str = "/api/generate";

const TEMPERATURE: f32 = 0.2;
const NUM_PREDICT: u32 = 220;

/// Client for the Ollama HTTP API.
#[derive(Clone)]
pub struct OllamaClient {
    url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OllamaClient {
    /// `endpoint` may be the server base URL or the full generate path.
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        let base = endpoint.trim_end_matches('/').to_string();
        let url = if base.ends_with(GENERATE_PATH) {
            base
        } else {
            format!("{}{}", base, GENERATE_PATH)
        };
        Self {
            url,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Provider for OllamaClient {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn send(&self, request: &LlmRequest) -> Result<LlmResponse, ProviderError> {
        let body = GenerateRequest {
            model: &request.model,
            prompt: &request.prompt,
            stream: false,
            system: &request.system,
            options: GenerateOptions {
                temperature: TEMPERATURE,
                num_predict: NUM_PREDICT,
            },
        };
        let mut req = self
            .client
            .post(&self.url)
            .timeout(request.timeout)
            .json(&body);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        let res = req.send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ProviderError::Api(format!("{} {}", status, body)));
        }
        let data: GenerateResponse = res.json().await?;
        let text = data
            .response
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::Api("response contained no text".to_string()))?;
        Ok(LlmResponse { text })
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    system: &'a str,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}
