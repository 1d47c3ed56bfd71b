//! Stdout contract: one JSON object the relay parses.
//!
//! Zero chunks => `{"response": ""}` (relay sends nothing). One chunk =>
//! `{"response": "..."}`. Several => `{"responses": ["...", ...]}`.

use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Reply<'a> {
    Single { response: &'a str },
    Multi { responses: &'a [String] },
}

/// Serialize the chunk sequence into the relay's JSON contract.
pub fn encode(chunks: &[String]) -> String {
    let reply = match chunks {
        [] => Reply::Single { response: "" },
        [one] => Reply::Single {
            response: one.as_str(),
        },
        many => Reply::Multi { responses: many },
    };
    // A string slice and a Vec<String> cannot fail to serialize.
    serde_json::to_string(&reply).unwrap_or_else(|_| r#"{"response": ""}"#.to_string())
}
