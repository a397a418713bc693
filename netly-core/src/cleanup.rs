//! §4.11 Cleanup engine — removes a node and everything that depends on
//! it. `soft` is the default path (marks rows deleted, leaves history
//! intact); `hard` permanently erases the node row and requires the caller
//! to prove intent with a confirmation string and an explicit force flag.
//! Both paths reach out over SSH first: `soft` stops the agent and
//! `sing-box` units and clears tmp/log directories, `hard` additionally
//! disables and removes the unit file, binary, and config directory.

use std::sync::Arc;

use netly_db::entities::timeline_event::{EventStatus, ResourceType};
use netly_db::repositories::{AllocationRepository, NodeRepository, ServiceRepository, TunnelRepository};

use crate::bootstrap::{AGENT_BINARY_PATH, AGENT_CONFIG_DIR, AGENT_UNIT_PATH};
use crate::context::OpContext;
use crate::crypto::AuthCipher;
use crate::error::{CoreError, CoreResult};
use crate::ssh::RemoteShell;
use crate::timeline::Timeline;

/// The literal confirmation string `hard` requires — matched exactly,
/// never the node's own name, so an operator must type it out deliberately.
pub const HARD_DELETE_CONFIRMATION: &str = "DELETE NODE";

pub struct CleanupEngine {
    pub nodes: Arc<dyn NodeRepository>,
    pub tunnels: Arc<dyn TunnelRepository>,
    pub services: Arc<dyn ServiceRepository>,
    pub allocations: Arc<dyn AllocationRepository>,
    pub timeline: Timeline,
    pub cipher: AuthCipher,
}

impl CleanupEngine {
    /// Soft-deletes a node along with every tunnel and service touching it.
    /// The node row, and the records of what it once had, survive for
    /// audit purposes and so `create_or_restore` can bring it back (§9).
    pub async fn soft(&self, ctx: &OpContext, node_id: i64) -> CoreResult<()> {
        let node = self.require_node(node_id).await?;

        self.timeline
            .record(
                ctx,
                "node.cleanup",
                EventStatus::Pending,
                "stopping agent and sing-box units on node",
                ResourceType::Node,
                node_id,
                serde_json::json!({"mode": "soft"}),
            )
            .await;

        if let Err(e) = self.run_remote(&node, soft_teardown_script()).await {
            self.timeline
                .record(
                    ctx,
                    "node.cleanup",
                    EventStatus::Failed,
                    e.to_string(),
                    ResourceType::Node,
                    node_id,
                    serde_json::json!({"mode": "soft"}),
                )
                .await;
            return Err(e);
        }

        self.soft_cascade(ctx, node_id).await
    }

    /// The DB side of a soft delete: cascades to dependent tunnels and
    /// services, releases their allocations, then marks the node deleted.
    /// Split out from [`Self::soft`] so it can run independent of the
    /// remote teardown step.
    async fn soft_cascade(&self, ctx: &OpContext, node_id: i64) -> CoreResult<()> {
        for tunnel in self.tunnels.list_for_node(node_id).await.map_err(CoreError::from)? {
            self.tunnels.soft_delete(tunnel.id).await.map_err(CoreError::from)?;
            self.allocations
                .release_for_tunnel(tunnel.id)
                .await
                .map_err(CoreError::from)?;
        }
        for service in self.services.list_for_node(node_id).await.map_err(CoreError::from)? {
            self.services.soft_delete(service.id).await.map_err(CoreError::from)?;
            self.allocations
                .release_for_service(service.id)
                .await
                .map_err(CoreError::from)?;
        }

        self.nodes.soft_delete(node_id).await.map_err(CoreError::from)?;

        self.timeline
            .record(
                ctx,
                "node.cleanup",
                EventStatus::Success,
                "soft-deleted node and dependent tunnels/services",
                ResourceType::Node,
                node_id,
                serde_json::json!({"mode": "soft"}),
            )
            .await;
        Ok(())
    }

    /// Permanently erases a node row. Requires `force` and the literal
    /// confirmation string `DELETE NODE` — not the node's own name — so an
    /// operator must type it deliberately since this path is irreversible.
    pub async fn hard(
        &self,
        ctx: &OpContext,
        node_id: i64,
        confirmation: &str,
        force: bool,
    ) -> CoreResult<()> {
        let node = self.require_node(node_id).await?;

        if !force {
            return Err(CoreError::Validation(
                "hard delete requires force=true".to_string(),
            ));
        }
        if confirmation != HARD_DELETE_CONFIRMATION {
            return Err(CoreError::Validation(format!(
                "confirmation `{confirmation}` does not match required string `{HARD_DELETE_CONFIRMATION}`"
            )));
        }

        self.soft_cascade(ctx, node_id).await.ok();

        self.timeline
            .record(
                ctx,
                "node.uninstall",
                EventStatus::Pending,
                "removing agent unit, binary, and config directory",
                ResourceType::Node,
                node_id,
                serde_json::json!({"mode": "hard"}),
            )
            .await;

        if let Err(e) = self.run_remote(&node, &hard_teardown_script()).await {
            self.timeline
                .record(
                    ctx,
                    "node.uninstall",
                    EventStatus::Failed,
                    e.to_string(),
                    ResourceType::Node,
                    node_id,
                    serde_json::json!({"mode": "hard"}),
                )
                .await;
            return Err(e);
        }

        self.nodes.hard_delete(node_id).await.map_err(CoreError::from)?;

        self.timeline
            .record(
                ctx,
                "node.uninstall",
                EventStatus::Success,
                "hard-deleted node",
                ResourceType::Node,
                node_id,
                serde_json::json!({"mode": "hard"}),
            )
            .await;
        Ok(())
    }

    /// Opens a shell session to the node, runs `script`, and closes it.
    /// A nonzero exit from the canned script is logged, not fatal — the
    /// teardown is best-effort against units/files that may already be
    /// gone; a failure to even reach the node over SSH is fatal and
    /// surfaced to the caller.
    async fn run_remote(&self, node: &netly_db::entities::node::Model, script: &str) -> CoreResult<()> {
        let auth = self
            .cipher
            .open(&node.auth_data)
            .map_err(|e| CoreError::Dependency(format!("failed to decrypt node credentials: {e}")))?;
        let mut shell = RemoteShell::new(node.endpoint_ip(), node.ssh_port as u16, auth);
        shell.connect_with_retry().await?;
        let out = shell.execute_with_retry(script).await?;
        shell.close().await?;
        if out.status_code != 0 {
            tracing::warn!(
                node_id = node.id,
                status = out.status_code,
                stderr = %out.stderr,
                "cleanup script exited nonzero"
            );
        }
        Ok(())
    }

    async fn require_node(&self, node_id: i64) -> CoreResult<netly_db::entities::node::Model> {
        self.nodes
            .get(node_id)
            .await
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::Conflict(format!("node {node_id} not found")))
    }
}

fn soft_teardown_script() -> &'static str {
    "systemctl stop netly-agent sing-box 2>/dev/null; \
     rm -rf /tmp/netly-agent-* /var/log/netly-agent*.log /var/log/sing-box*.log"
}

fn hard_teardown_script() -> String {
    format!(
        "systemctl disable --now netly-agent sing-box 2>/dev/null; \
         rm -f {AGENT_UNIT_PATH} {AGENT_BINARY_PATH}; \
         rm -rf {AGENT_CONFIG_DIR}; \
         systemctl daemon-reload"
    )
}
