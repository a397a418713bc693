//! # Install-script and liveness routes
//!
//! `GET /install.sh` serves the first-boot bootstrap script a node can run
//! on its own instead of waiting for the control plane to SSH in (§4.8's
//! push path remains the primary one; this is the pull-based alternative
//! the external interfaces section also names). `GET /healthz` is the
//! standard operational liveness probe every service in the pack exposes.

use axum::extract::State;
use axum::response::IntoResponse;

use crate::state::AppState;

pub async fn healthz() -> impl IntoResponse {
    "ok"
}

pub async fn install_script(State(state): State<AppState>) -> impl IntoResponse {
    let public_url = &state.config.security.public_url;
    let script = format!(
        "#!/bin/sh\nset -eu\n\n# Netly agent bootstrap script.\n# Usage: run this on a node that has already been registered\n# with the control plane and has its node token exported as\n# NETLY_NODE_TOKEN.\n\nNETLY_URL=\"{public_url}\"\n\nif [ -z \"${{NETLY_NODE_TOKEN:-}}\" ]; then\n  echo \"NETLY_NODE_TOKEN must be set\" >&2\n  exit 1\nfi\n\ncurl -fsSL \"$NETLY_URL/agent/binary\" -H \"Authorization: Bearer $NETLY_NODE_TOKEN\" -o /usr/local/bin/netly-agent\nchmod +x /usr/local/bin/netly-agent\n\necho \"netly-agent installed; configure its supervisor unit to start it with --server $NETLY_URL\"\n"
    );
    ([("content-type", "text/x-shellscript")], script)
}
