//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.meshclaw/config.json`), then
//! environment overrides are applied and the result is validated once. An
//! invalid config aborts the process before any network call is attempted.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Appended to the last chunk when output is truncated. Budgets must leave
/// room for it, so validation rejects limits at or below its size.
pub const TRUNCATION_MARKER: &str = "…";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// LLM provider selection and connection settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Trigger prefixes/pattern that mark a mesh message as a command.
    #[serde(default)]
    pub triggers: TriggerConfig,

    /// Outbound chunk budgets (radio payload limits).
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Per-sender rate limit in seconds. 0 disables rate limiting.
    #[serde(default)]
    pub rate_limit_seconds: u64,

    /// Rate-limit state file (default ~/.meshclaw/rate_state.json).
    pub rate_state_path: Option<PathBuf>,

    /// When non-empty, only these sender ids are answered; everyone else is
    /// silently ignored.
    #[serde(default)]
    pub allowed_senders: Vec<String>,
}

/// Which LLM backend to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI-compatible chat-completions API (/v1/chat/completions).
    #[default]
    OpenaiCompat,

    /// Ollama generate API (/api/generate).
    Ollama,
}

/// Provider endpoint, model, credentials, and request deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,

    /// Base URL or full API path; the client appends the provider path when
    /// given a base URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Optional bearer credential. Many local providers need none.
    pub api_key: Option<String>,

    /// System message sent with every prompt; keeps replies radio-sized.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Network deadline for the provider call. Must be set strictly below the
    /// host relay's own execution timeout.
    #[serde(default = "default_timeout_seconds")]
    pub request_timeout_seconds: f64,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful assistant. Keep answers concise and suitable for short radio text messages."
        .to_string()
}

fn default_timeout_seconds() -> f64 {
    8.0
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            system_prompt: default_system_prompt(),
            request_timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Ordered trigger list. Prefixes are matched case-sensitively; the optional
/// regex pattern is tried after the prefixes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerConfig {
    #[serde(default = "default_prefixes")]
    pub prefixes: Vec<String>,

    /// Optional regex trigger, anchored at the start of the message. Capture
    /// group 1 (when present) is the prompt, otherwise the text after the match.
    pub pattern: Option<String>,
}

fn default_prefixes() -> Vec<String> {
    vec!["!ask".to_string(), "@claw".to_string(), "@ai".to_string()]
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            prefixes: default_prefixes(),
            pattern: None,
        }
    }
}

/// Chunk budgets for outbound mesh messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitsConfig {
    /// Max characters per chunk (default 200).
    #[serde(default = "default_max_msg")]
    pub max_msg_chars: usize,

    /// Max UTF-8 bytes per chunk (default 200).
    #[serde(default = "default_max_msg")]
    pub max_msg_bytes: usize,

    /// Max chunks per reply (default 4); extra content is truncated.
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,

    /// When false, replies are clamped to a single chunk.
    #[serde(default = "default_true")]
    pub split_long_responses: bool,
}

fn default_max_msg() -> usize {
    200
}

fn default_max_chunks() -> usize {
    4
}

fn default_true() -> bool {
    true
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_msg_chars: default_max_msg(),
            max_msg_bytes: default_max_msg(),
            max_chunks: default_max_chunks(),
            split_long_responses: default_true(),
        }
    }
}

/// Rejected configuration. Always fatal: the diagnostic goes to stderr and the
/// process exits before any provider call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no triggers configured (need at least one prefix or a pattern)")]
    NoTriggers,
    #[error("invalid trigger pattern: {0}")]
    BadPattern(#[from] regex::Error),
    #[error("{name} must be greater than the truncation marker ({name} = {value})")]
    LimitTooSmall { name: &'static str, value: usize },
    #[error("maxChunks must be at least 1")]
    NoChunks,
    #[error("requestTimeoutSeconds must be positive (got {0})")]
    BadTimeout(f64),
    #[error("provider endpoint is empty")]
    EmptyEndpoint,
    #[error("provider model is empty")]
    EmptyModel,
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("MESHCLAW_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".meshclaw").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Default rate-state path next to the config dir.
pub fn default_rate_state_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".meshclaw").join("rate_state.json"))
        .unwrap_or_else(|| PathBuf::from("rate_state.json"))
}

/// Load config from the default path (or MESHCLAW_CONFIG_PATH), apply
/// environment overrides, and validate. Missing file => defaults.
pub fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(default_config_path);
    let mut config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim().to_string();
        if t.is_empty() {
            None
        } else {
            Some(t)
        }
    })
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let s = env_string(name)?;
    match s.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring unparsable env override {}={}", name, s);
            None
        }
    }
}

/// Environment overrides win over the config file, matching the variable
/// names the host relay documents (LLM_PROVIDER, LLM_ENDPOINT, ...).
fn apply_env_overrides(config: &mut Config) {
    if let Some(kind) = env_string("LLM_PROVIDER") {
        match kind.to_ascii_lowercase().as_str() {
            "openai_compat" => config.provider.kind = ProviderKind::OpenaiCompat,
            "ollama" => config.provider.kind = ProviderKind::Ollama,
            other => log::warn!("ignoring unknown LLM_PROVIDER={}", other),
        }
    }
    if let Some(v) = env_string("LLM_ENDPOINT") {
        config.provider.endpoint = v;
    }
    if let Some(v) = env_string("LLM_MODEL") {
        config.provider.model = v;
    }
    if let Some(v) = env_string("LLM_API_KEY") {
        config.provider.api_key = Some(v);
    }
    if let Some(v) = env_string("LLM_SYSTEM_PROMPT") {
        config.provider.system_prompt = v;
    }
    if let Some(v) = env_parse::<f64>("LLM_TIMEOUT") {
        config.provider.request_timeout_seconds = v;
    }
    if let Some(v) = env_parse::<usize>("MAX_MSG_CHARS") {
        config.limits.max_msg_chars = v;
    }
    if let Some(v) = env_parse::<usize>("MAX_MSG_BYTES") {
        config.limits.max_msg_bytes = v;
    }
    if let Some(v) = env_parse::<usize>("MAX_CHUNKS") {
        config.limits.max_chunks = v;
    }
    if let Some(v) = env_string("SPLIT_LONG_RESPONSES") {
        config.limits.split_long_responses =
            !matches!(v.to_ascii_lowercase().as_str(), "0" | "false");
    }
    if let Some(v) = env_parse::<u64>("RATE_LIMIT_SECONDS") {
        config.rate_limit_seconds = v;
    }
}

impl Config {
    /// Check every startup invariant. Called once by `load_config`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.triggers.prefixes.iter().all(|p| p.trim().is_empty())
            && self.triggers.pattern.is_none()
        {
            return Err(ConfigError::NoTriggers);
        }
        if let Some(ref pattern) = self.triggers.pattern {
            regex::Regex::new(pattern)?;
        }
        if self.limits.max_msg_chars <= TRUNCATION_MARKER.chars().count() {
            return Err(ConfigError::LimitTooSmall {
                name: "maxMsgChars",
                value: self.limits.max_msg_chars,
            });
        }
        if self.limits.max_msg_bytes <= TRUNCATION_MARKER.len() {
            return Err(ConfigError::LimitTooSmall {
                name: "maxMsgBytes",
                value: self.limits.max_msg_bytes,
            });
        }
        if self.limits.max_chunks == 0 {
            return Err(ConfigError::NoChunks);
        }
        if !(self.provider.request_timeout_seconds > 0.0) {
            return Err(ConfigError::BadTimeout(self.provider.request_timeout_seconds));
        }
        if self.provider.endpoint.trim().is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }
        if self.provider.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel);
        }
        Ok(())
    }

    /// Rate-state path with the home-dir default applied.
    pub fn rate_state_path(&self) -> PathBuf {
        self.rate_state_path
            .clone()
            .unwrap_or_else(default_rate_state_path)
    }
}
