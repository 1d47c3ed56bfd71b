//! Meshclaw core library — config, trigger parsing, rate limiting, LLM
//! provider clients, response shaping, and dispatch for the per-message CLI.

pub mod config;
pub mod dispatch;
pub mod limiter;
pub mod llm;
pub mod relay;
pub mod shaper;
pub mod trigger;
