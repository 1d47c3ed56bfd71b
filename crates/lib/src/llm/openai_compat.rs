//! OpenAI-compatible chat-completions client.
//!
//! Works against any /v1/chat/completions endpoint (OpenAI, LM Studio, vLLM,
//! llama.cpp server, ...). The reply text is `choices[0].message.content`,
//! with a top-level `text` field as fallback for simpler servers.

use crate::llm::{LlmRequest, LlmResponse, Provider, ProviderError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

// Kept modest to reduce latency and keep answers radio-sized.
const TEMPERATURE: f32 = 0.2;
const MAX_TOKENS: u32 = 220;

/// Client for an OpenAI-compatible HTTP API.
#[derive(Clone)]
pub struct OpenAiCompatClient {
    url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// `endpoint` may be a base URL (path is appended), a base ending in
    /// `/v1`, or the full chat-completions path.
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        let base = endpoint.trim_end_matches('/').to_string();
        let url = if base.ends_with(CHAT_COMPLETIONS_PATH) {
            base
        } else if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}{}", base, CHAT_COMPLETIONS_PATH)
        };
        Self {
            url,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatClient {
    fn name(&self) -> &'static str {
        "openai_compat"
    }

    async fn send(&self, request: &LlmRequest) -> Result<LlmResponse, ProviderError> {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: &request.system,
                },
                WireMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
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
        let ChatResponse { choices, text } = res.json().await?;
        let content = choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| text.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
            .ok_or_else(|| ProviderError::Api("response contained no message content".to_string()))?;
        Ok(LlmResponse { text: content })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<Choice>>,
    /// Some minimal servers return a bare text field instead of choices.
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
