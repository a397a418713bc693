//! Command result report — `POST /agent/command/result`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResultRequest {
    pub command_id: u64,
    pub success: bool,
    pub output: String,
    pub timestamp: i64,
}
