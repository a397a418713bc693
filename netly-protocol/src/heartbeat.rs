//! Heartbeat request/response — `POST /agent/heartbeat`.

use serde::{Deserialize, Serialize};

use crate::command::Command;

/// System metrics an agent reports on every heartbeat. Stored verbatim into
/// the owning node's `stats` opaque map by the agent endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStats {
    pub cpu_usage: f64,
    pub ram_usage: f64,
    pub ram_total: u64,
    pub ram_used: u64,
    pub uptime: u64,
    pub network_rx: u64,
    pub network_tx: u64,
    pub hostname: String,
    pub os: String,
    pub platform: String,
    pub collected_at: i64,
}

/// Body of `POST /agent/heartbeat`.
///
/// One heartbeat round-trip is both the liveness signal for the reporting
/// node and the delivery mechanism for any commands queued against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub stats: NodeStats,
    pub agent_version: String,
    pub timestamp: i64,
}

/// Response to a heartbeat: the drained set of pending commands for the
/// authenticated node, in creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub success: bool,
    pub commands: Vec<Command>,
}

impl HeartbeatResponse {
    pub fn ok(commands: Vec<Command>) -> Self {
        Self {
            success: true,
            commands,
        }
    }
}
