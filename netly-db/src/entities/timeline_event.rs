//! `timeline_events` table — §3 TimelineEvent. Append-only.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "timeline_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub event_type: String,
    pub status: String,
    pub message: String,
    /// Always includes `request_id`/`task_id` when present in the ambient
    /// context that produced the event (§3, §5).
    #[sea_orm(column_type = "Json")]
    pub meta: serde_json::Value,
    pub resource_type: String,
    pub resource_id: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// §3: `status` ∈ {pending, success, failed}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Success,
    Failed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Success => "success",
            EventStatus::Failed => "failed",
        }
    }
}

/// §3: `resource_type` ∈ {node, tunnel, service}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Node,
    Tunnel,
    Service,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Node => "node",
            ResourceType::Tunnel => "tunnel",
            ResourceType::Service => "service",
        }
    }
}
