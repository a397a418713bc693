//! `services` table — §3 Service.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "services")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub protocol: String,
    pub node_id: i64,
    pub listen_port: i32,
    pub routing_mode: String,
    /// May carry an allocated `fqdn` key (§4.4).
    #[sea_orm(column_type = "Json")]
    pub config: serde_json::Value,
    pub status: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// §3: `routing_mode` ∈ {direct, tunnel}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    Direct,
    Tunnel,
}

impl Model {
    pub fn fqdn(&self) -> Option<&str> {
        self.config.get("fqdn").and_then(|v| v.as_str())
    }
}
