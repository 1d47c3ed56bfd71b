//! Inbound message from the host relay: defensive extraction from the stdin
//! payload. Relay versions differ in where they put the text and sender, so
//! several flat keys and nested packet paths are tried in order.

use serde_json::Value;

/// Whether the message arrived as a direct message or on a shared channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageChannel {
    Direct,
    Broadcast,
}

/// One mesh message, built once per invocation from the relay payload.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub sender_id: String,
    pub text: String,
    pub channel: MessageChannel,
}

const TEXT_KEYS: [&str; 5] = ["message", "text", "msg", "body", "content"];

const TEXT_PATHS: [&[&str]; 6] = [
    &["packet", "decoded", "payload", "text"],
    &["packet", "decoded", "payload", "message"],
    &["packet", "decoded", "text"],
    &["decoded", "payload", "text"],
    &["decoded", "text"],
    &["payload", "text"],
];

const SENDER_KEYS: [&str; 5] = ["sender", "senderId", "fromId", "from", "nodeId"];

impl InboundMessage {
    /// Parse the raw stdin contents. Non-JSON input is treated as the message
    /// text itself. Returns None when no text can be found at all.
    pub fn from_stdin(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let payload: Value = serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::json!({ "message": raw }));
        Self::from_payload(&payload)
    }

    /// Extract (text, sender, channel) from a relay payload object.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let text = extract_text(payload)?;
        Some(Self {
            sender_id: extract_sender(payload),
            text,
            channel: extract_channel(payload),
        })
    }
}

fn non_empty(v: &Value) -> Option<String> {
    v.as_str().map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

fn dig<'a>(payload: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cur = payload;
    for key in path {
        cur = cur.get(key)?;
    }
    Some(cur)
}

fn extract_text(payload: &Value) -> Option<String> {
    for key in TEXT_KEYS {
        if let Some(s) = payload.get(key).and_then(non_empty) {
            return Some(s);
        }
    }
    for path in TEXT_PATHS {
        if let Some(s) = dig(payload, path).and_then(non_empty) {
            return Some(s);
        }
    }
    None
}

fn extract_sender(payload: &Value) -> String {
    for key in SENDER_KEYS {
        let v = match payload.get(key) {
            Some(v) => v,
            None => continue,
        };
        if let Some(s) = non_empty(v) {
            return s;
        }
        // Meshtastic node numbers come through as integers.
        if let Some(n) = v.as_u64() {
            return n.to_string();
        }
    }
    if let Some(v) = dig(payload, &["packet", "from"]) {
        if let Some(s) = non_empty(v) {
            return s;
        }
        if let Some(n) = v.as_u64() {
            return n.to_string();
        }
    }
    "unknown".to_string()
}

fn extract_channel(payload: &Value) -> MessageChannel {
    if let Some(s) = payload.get("channel").and_then(Value::as_str) {
        if s.eq_ignore_ascii_case("direct") || s.eq_ignore_ascii_case("dm") {
            return MessageChannel::Direct;
        }
    }
    if payload.get("direct").and_then(Value::as_bool) == Some(true) {
        return MessageChannel::Direct;
    }
    MessageChannel::Broadcast
}
