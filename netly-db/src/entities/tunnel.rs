//! `tunnels` table — §3 Tunnel.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tunnels")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub protocol: String,
    /// §3: `type` ∈ {direct, chain}. Named `kind` to avoid the `type` keyword.
    #[sea_orm(column_name = "type")]
    pub kind: String,
    pub source_node_id: i64,
    pub dest_node_id: i64,
    pub source_port: i32,
    pub dest_port: i32,
    pub internal_ipv4: String,
    pub internal_ipv6: String,
    #[sea_orm(column_type = "Json")]
    pub config: serde_json::Value,
    /// Ordered node id list for chains; empty for direct tunnels.
    #[sea_orm(column_type = "Json")]
    pub hops: serde_json::Value,
    /// Per-segment IP/port/endpoint map for chains; empty object for direct.
    #[sea_orm(column_type = "Json")]
    pub segments: serde_json::Value,
    pub status: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// §3: `type` ∈ {direct, chain}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TunnelKind {
    Direct,
    Chain,
}

impl TunnelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TunnelKind::Direct => "direct",
            TunnelKind::Chain => "chain",
        }
    }
}

/// §3: `status` ∈ {pending, active, error}.
///
/// Per the open question recorded in `DESIGN.md`, `active` means "commands
/// dispatched to every participating agent", not "both endpoints report the
/// WireGuard interface up" — there is no liveness probe in this
/// specification's scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TunnelStatus {
    Pending,
    Active,
    Error,
}

impl TunnelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TunnelStatus::Pending => "pending",
            TunnelStatus::Active => "active",
            TunnelStatus::Error => "error",
        }
    }
}
