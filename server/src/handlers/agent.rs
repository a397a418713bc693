//! # Agent Protocol Handlers
//!
//! The three HTTP endpoints a `netly-agent` speaks to: register its
//! generated WireGuard key once on first boot, heartbeat on an interval
//! (doubling as command delivery), and report back the result of a
//! delivered command. Generalizes the teacher's `ws_handler` connection
//! lifecycle from one multiplexed WebSocket to three short-lived,
//! bearer-authenticated HTTP requests.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use netly_protocol::{
    parse_node_token, CommandResultRequest, CommandStatus, HeartbeatRequest, HeartbeatResponse,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: message.into() })).into_response()
}

/// Extracts and validates the `Authorization: Bearer node-token-<id>`
/// header, returning the authenticated node id.
fn authenticate(headers: &HeaderMap) -> Result<u64, Response> {
    let raw = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "missing authorization header"))?;
    let token = raw
        .strip_prefix("Bearer ")
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "expected a bearer token"))?;
    parse_node_token(token)
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "malformed node token"))
}

/// `POST /agent/register` — records the WireGuard public key an agent
/// generated for itself on first boot. The control plane never generates
/// or sees a node's private key (§9).
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub public_key: String,
}

pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegisterRequest>,
) -> Response {
    let node_id = match authenticate(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.nodes.get(node_id as i64).await {
        Ok(Some(_)) => {}
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "unknown node"),
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }

    if let Err(e) = state
        .nodes
        .update_wireguard_key(node_id as i64, body.public_key)
        .await
    {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    info!(node_id, "agent registered its wireguard key");
    StatusCode::NO_CONTENT.into_response()
}

/// `POST /agent/heartbeat` — updates the node's reported stats and status,
/// and drains any commands queued for it.
pub async fn heartbeat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<HeartbeatRequest>,
) -> Response {
    let node_id = match authenticate(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.nodes.get(node_id as i64).await {
        Ok(Some(_)) => {}
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "unknown node"),
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }

    let stats = match serde_json::to_value(&body.stats) {
        Ok(v) => v,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    if let Err(e) = state.nodes.update_stats(node_id as i64, stats).await {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }
    if let Err(e) = state
        .nodes
        .update_status(node_id as i64, "online", None)
        .await
    {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    let commands = state.tasks.pending_commands(node_id);
    if !commands.is_empty() {
        info!(node_id, count = commands.len(), "delivering queued commands");
    }
    Json(HeartbeatResponse::ok(commands)).into_response()
}

/// `POST /agent/command/result` — records the outcome of a previously
/// delivered command.
pub async fn command_result(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CommandResultRequest>,
) -> Response {
    let node_id = match authenticate(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let Some(record) = state.tasks.get_command(body.command_id) else {
        return error_response(StatusCode::NOT_FOUND, "unknown command");
    };
    if record.command.node_id != node_id {
        warn!(
            node_id,
            command_id = body.command_id,
            owner = record.command.node_id,
            "command result reported by the wrong node"
        );
        return error_response(StatusCode::FORBIDDEN, "command belongs to a different node");
    }

    let status = if body.success {
        CommandStatus::Succeeded
    } else {
        CommandStatus::Failed
    };
    state
        .tasks
        .update_command_status(body.command_id, status, Some(body.output));

    StatusCode::NO_CONTENT.into_response()
}
