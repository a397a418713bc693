//! `nodes` table — §3 Node.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "nodes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    /// Public, routable address. Unique among non-deleted rows.
    pub ip: String,
    /// Preferred tunnel endpoint when present; falls back to `ip`.
    pub private_ip: Option<String>,
    pub ssh_port: i32,
    pub role: String,
    pub status: String,
    /// AES-GCM ciphertext of `{user, password?, ssh_key?}`.
    pub auth_data: Vec<u8>,
    pub wireguard_public_key: Option<String>,
    #[sea_orm(column_type = "Json")]
    pub geo_data: serde_json::Value,
    #[sea_orm(column_type = "Json")]
    pub stats: serde_json::Value,
    pub last_log: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// §3: `role` ∈ {entry, exit, hybrid, internal}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Entry,
    Exit,
    Hybrid,
    Internal,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Entry => "entry",
            NodeRole::Exit => "exit",
            NodeRole::Hybrid => "hybrid",
            NodeRole::Internal => "internal",
        }
    }
}

impl std::str::FromStr for NodeRole {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entry" => Ok(NodeRole::Entry),
            "exit" => Ok(NodeRole::Exit),
            "hybrid" => Ok(NodeRole::Hybrid),
            "internal" => Ok(NodeRole::Internal),
            other => Err(format!("unknown node role `{other}`")),
        }
    }
}

/// §3: `status` ∈ {pending, installing, online, offline, error}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Installing,
    Online,
    Offline,
    Error,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Pending => "pending",
            NodeStatus::Installing => "installing",
            NodeStatus::Online => "online",
            NodeStatus::Offline => "offline",
            NodeStatus::Error => "error",
        }
    }
}

impl std::str::FromStr for NodeStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(NodeStatus::Pending),
            "installing" => Ok(NodeStatus::Installing),
            "online" => Ok(NodeStatus::Online),
            "offline" => Ok(NodeStatus::Offline),
            "error" => Ok(NodeStatus::Error),
            other => Err(format!("unknown node status `{other}`")),
        }
    }
}

impl Model {
    /// The address a tunnel endpoint should dial to reach this node:
    /// `private_ip` when present, otherwise the public `ip` (§4.6).
    pub fn endpoint_ip(&self) -> &str {
        self.private_ip.as_deref().unwrap_or(&self.ip)
    }
}
