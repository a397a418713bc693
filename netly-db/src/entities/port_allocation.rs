//! `port_allocations` — uniqueness ledger backing the `(node_id, port,
//! protocol)` composite index described in §6. PortAM's actual allocation
//! algorithm (§4.3) scans tunnels and services directly; this table is the
//! database-level backstop.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "port_allocations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub tunnel_id: Option<i64>,
    pub service_id: Option<i64>,
    pub node_id: i64,
    pub port: i32,
    pub protocol: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
