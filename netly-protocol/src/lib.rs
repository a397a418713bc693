//! # Agent Wire Protocol
//!
//! Defines the JSON messages exchanged between a `netly-agent` running on a
//! managed node and the control plane's agent endpoint. Unlike the original
//! relay's `WsMessage` enum (one multiplexed WebSocket stream), this
//! protocol is two plain HTTPS request/response pairs: a heartbeat that
//! doubles as the command-delivery mechanism, and a result report.
//!
//! ## Modules
//!
//! - [`heartbeat`] — heartbeat request/response and the embedded stats payload
//! - [`command`]   — command envelope, command types and their payload shapes
//! - [`result`]    — the result-report request

mod command;
mod heartbeat;
mod result;

pub use command::{Command, CommandPayload, CommandStatus, CommandType};
pub use heartbeat::{HeartbeatRequest, HeartbeatResponse, NodeStats};
pub use result::CommandResultRequest;

/// The bearer token scheme used by agents to authenticate to the control
/// plane: `node-token-<id>`. Parsing lives here because both the agent
/// endpoint and any future mTLS replacement (see design note in §9 of the
/// specification) need to agree on the exact grammar.
pub fn parse_node_token(token: &str) -> Option<u64> {
    token.strip_prefix("node-token-")?.parse().ok()
}

pub fn node_token(node_id: u64) -> String {
    format!("node-token-{node_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_token() {
        assert_eq!(parse_node_token("node-token-42"), Some(42));
    }

    #[test]
    fn rejects_malformed_token() {
        assert_eq!(parse_node_token("node-token-"), None);
        assert_eq!(parse_node_token("node-token-abc"), None);
        assert_eq!(parse_node_token("bearer-42"), None);
    }

    #[test]
    fn round_trips() {
        assert_eq!(parse_node_token(&node_token(7)), Some(7));
    }
}
