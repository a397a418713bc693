//! `ip_allocations` — uniqueness ledger backing the `(node_id, ip_address)`
//! composite index described in §6. IPAM's actual allocation algorithm
//! (§4.2) scans tunnels directly; this table is the database-level
//! backstop that makes the same invariant enforceable by a unique index
//! rather than relying solely on the key-locker + in-memory mutex.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "ip_allocations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub tunnel_id: i64,
    pub node_id: i64,
    pub ip_address: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
