//! Host-relay I/O: the inbound message payload and the stdout JSON contract.
//!
//! The relay invokes the bridge once per mesh message with a JSON payload on
//! stdin and parses exactly one JSON object from stdout.

mod inbound;
mod outbound;

pub use inbound::{InboundMessage, MessageChannel};
pub use outbound::encode;
