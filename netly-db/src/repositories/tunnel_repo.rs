//! Tunnel repository — §3 Tunnel, §8 invariants 1/2/6.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};

use crate::entities::tunnel;
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct NewTunnel {
    pub name: String,
    pub protocol: String,
    pub kind: String,
    pub source_node_id: i64,
    pub dest_node_id: i64,
    pub source_port: i32,
    pub dest_port: i32,
    pub internal_ipv4: String,
    pub internal_ipv6: String,
    pub config: serde_json::Value,
    pub hops: serde_json::Value,
    pub segments: serde_json::Value,
}

#[async_trait]
pub trait TunnelRepository: Send + Sync {
    async fn create(&self, new: NewTunnel) -> DbResult<tunnel::Model>;
    async fn get(&self, id: i64) -> DbResult<Option<tunnel::Model>>;
    /// All non-deleted tunnels regardless of status — IPAM/PortAM must see
    /// `pending` allocations too, since a subnet/port is reserved the
    /// instant the record is persisted, not when it turns `active`.
    async fn list_all(&self) -> DbResult<Vec<tunnel::Model>>;
    /// Tunnels where `node_id` participates as source, dest, or any hop.
    async fn list_for_node(&self, node_id: i64) -> DbResult<Vec<tunnel::Model>>;
    async fn update_status(&self, id: i64, status: &str) -> DbResult<()>;
    /// Deletes exactly one row; returns an error if none matched (§8 invariant 6).
    async fn soft_delete(&self, id: i64) -> DbResult<()>;
}

pub struct SeaOrmTunnelRepository {
    db: DatabaseConnection,
}

impl SeaOrmTunnelRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TunnelRepository for SeaOrmTunnelRepository {
    async fn create(&self, new: NewTunnel) -> DbResult<tunnel::Model> {
        let now = Utc::now();
        let am = tunnel::ActiveModel {
            name: Set(new.name),
            protocol: Set(new.protocol),
            kind: Set(new.kind),
            source_node_id: Set(new.source_node_id),
            dest_node_id: Set(new.dest_node_id),
            source_port: Set(new.source_port),
            dest_port: Set(new.dest_port),
            internal_ipv4: Set(new.internal_ipv4),
            internal_ipv6: Set(new.internal_ipv6),
            config: Set(new.config),
            hops: Set(new.hops),
            segments: Set(new.segments),
            status: Set("pending".to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        };
        Ok(am.insert(&self.db).await?)
    }

    async fn get(&self, id: i64) -> DbResult<Option<tunnel::Model>> {
        Ok(tunnel::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn list_all(&self) -> DbResult<Vec<tunnel::Model>> {
        Ok(tunnel::Entity::find()
            .filter(tunnel::Column::DeletedAt.is_null())
            .all(&self.db)
            .await?)
    }

    async fn list_for_node(&self, node_id: i64) -> DbResult<Vec<tunnel::Model>> {
        let rows = tunnel::Entity::find()
            .filter(tunnel::Column::DeletedAt.is_null())
            .filter(
                Condition::any()
                    .add(tunnel::Column::SourceNodeId.eq(node_id))
                    .add(tunnel::Column::DestNodeId.eq(node_id)),
            )
            .all(&self.db)
            .await?;
        // Chain hops aren't indexed columns; filter the JSON array in memory.
        let mut all = self.list_all().await?;
        all.retain(|t| {
            t.hops
                .as_array()
                .map(|hops| hops.iter().any(|h| h.as_i64() == Some(node_id)))
                .unwrap_or(false)
        });
        let mut out = rows;
        for t in all {
            if !out.iter().any(|r| r.id == t.id) {
                out.push(t);
            }
        }
        Ok(out)
    }

    async fn update_status(&self, id: i64, status: &str) -> DbResult<()> {
        let row = tunnel::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DbError::NotFound)?;
        let mut am: tunnel::ActiveModel = row.into();
        am.status = Set(status.to_string());
        am.updated_at = Set(Utc::now());
        am.update(&self.db).await?;
        Ok(())
    }

    async fn soft_delete(&self, id: i64) -> DbResult<()> {
        let result = tunnel::Entity::update_many()
            .col_expr(tunnel::Column::DeletedAt, Expr::value(Utc::now()))
            .filter(tunnel::Column::Id.eq(id))
            .filter(tunnel::Column::DeletedAt.is_null())
            .exec(&self.db)
            .await?;
        if result.rows_affected != 1 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}
