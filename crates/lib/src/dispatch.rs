//! Dispatch: one pass from inbound mesh message to outbound chunks.
//!
//! Received -> allow-list -> trigger parse -> help -> rate limit -> provider
//! -> shape. Every provider failure becomes a short generic notice; raw
//! status codes, bodies, and endpoint details go to the log only, never over
//! the radio.

use crate::config::Config;
use crate::limiter::{RateDecision, RateLimiter};
use crate::llm::{LlmRequest, Provider, ProviderError};
use crate::relay::{InboundMessage, MessageChannel};
use crate::shaper::{self, ChunkLimits};
use crate::trigger::{self, Trigger};
use chrono::Utc;
use std::time::Duration;

/// Fixed notice for a throttled sender; no provider call is made.
pub const THROTTLED_NOTICE: &str = "Rate limit reached. Please wait before asking again.";
/// Fixed notice when the provider call hit the request deadline.
pub const TIMEOUT_NOTICE: &str = "The assistant timed out. Please try again.";
/// Fixed notice for every other provider failure.
pub const UNAVAILABLE_NOTICE: &str =
    "The assistant is unavailable right now. Please try again later.";
/// Sent when the provider succeeded but produced no usable text.
pub const EMPTY_REPLY_NOTICE: &str = "No response.";

/// Terminal state of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No trigger matched, empty prompt, or unlisted sender. Nothing is sent.
    Ignored,
    /// Help command answered locally.
    Help,
    /// Sender is over the rate limit.
    Throttled,
    Succeeded,
    Failed,
}

/// Outcome plus the chunks to hand to the output encoder.
#[derive(Debug)]
pub struct DispatchResult {
    pub outcome: Outcome,
    pub chunks: Vec<String>,
}

/// Orchestrates one invocation. Holds the parsed trigger list, the selected
/// provider, and the optional rate limiter.
pub struct Dispatcher<'a> {
    config: &'a Config,
    triggers: Vec<Trigger>,
    provider: &'a dyn Provider,
    limiter: Option<RateLimiter>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(config: &'a Config, provider: &'a dyn Provider) -> Self {
        let triggers = trigger::triggers_from_config(&config.triggers);
        let limiter = (config.rate_limit_seconds > 0).then(|| {
            RateLimiter::new(config.rate_state_path(), config.rate_limit_seconds)
        });
        Self {
            config,
            triggers,
            provider,
            limiter,
        }
    }

    /// Run the state machine for one message. Infallible: every path ends in
    /// a well-formed chunk set (possibly empty).
    pub async fn handle(&self, msg: &InboundMessage) -> DispatchResult {
        if !self.config.allowed_senders.is_empty()
            && !self.config.allowed_senders.iter().any(|s| s == &msg.sender_id)
        {
            log::info!("ignoring message from unlisted sender {}", msg.sender_id);
            return self.done(Outcome::Ignored, Vec::new());
        }

        let cmd = match trigger::parse(&msg.text, &self.triggers) {
            Some(cmd) => cmd,
            None => {
                log::debug!("no trigger matched, ignoring");
                return self.done(Outcome::Ignored, Vec::new());
            }
        };

        if cmd.prompt.eq_ignore_ascii_case("help") {
            return self.done(Outcome::Help, self.shaped(&self.help_text()));
        }

        if let Some(ref limiter) = self.limiter {
            match limiter.check_and_record(&msg.sender_id, Utc::now()) {
                Ok(RateDecision::Allowed) => {}
                Ok(RateDecision::Throttled) => {
                    log::info!("throttling sender {}", msg.sender_id);
                    return self.done(Outcome::Throttled, self.shaped(THROTTLED_NOTICE));
                }
                Err(e) => {
                    // A broken state file should not silence the bridge.
                    log::warn!("rate limiter unavailable, allowing: {:#}", e);
                }
            }
        }

        let request = LlmRequest {
            model: self.config.provider.model.clone(),
            prompt: cmd.prompt.clone(),
            system: self.config.provider.system_prompt.clone(),
            timeout: Duration::from_secs_f64(self.config.provider.request_timeout_seconds),
        };
        log::info!(
            "dispatching to {} for sender {} via {} ({})",
            self.provider.name(),
            msg.sender_id,
            cmd.trigger,
            channel_name(msg.channel),
        );

        match self.provider.send(&request).await {
            Ok(res) => {
                let text = shaper::normalize(&res.text);
                let text = if text.is_empty() {
                    EMPTY_REPLY_NOTICE.to_string()
                } else {
                    text
                };
                self.done(Outcome::Succeeded, self.shaped(&text))
            }
            Err(e) => {
                log::warn!("provider {} failed: {}", self.provider.name(), e);
                let notice = match e {
                    ProviderError::Timeout => TIMEOUT_NOTICE,
                    ProviderError::Connection(_) | ProviderError::Api(_) => UNAVAILABLE_NOTICE,
                };
                self.done(Outcome::Failed, self.shaped(notice))
            }
        }
    }

    fn done(&self, outcome: Outcome, chunks: Vec<String>) -> DispatchResult {
        log::info!("outcome: {:?} ({} chunks)", outcome, chunks.len());
        DispatchResult { outcome, chunks }
    }

    fn shaped(&self, text: &str) -> Vec<String> {
        shaper::shape(text, &ChunkLimits::from_config(&self.config.limits))
    }

    fn help_text(&self) -> String {
        let prefixes: Vec<&str> = self
            .config
            .triggers
            .prefixes
            .iter()
            .map(String::as_str)
            .filter(|p| !p.trim().is_empty())
            .collect();
        match prefixes.first() {
            Some(first) => format!(
                "Usage: start with {}. Example: {} What is 5x5?",
                prefixes.join(", "),
                first
            ),
            None => "Usage: send a prompt after the configured trigger.".to_string(),
        }
    }
}

fn channel_name(channel: MessageChannel) -> &'static str {
    match channel {
        MessageChannel::Direct => "direct",
        MessageChannel::Broadcast => "broadcast",
    }
}
