//! Allocation ledger repository backing the composite unique indices in §6.
//! The tunnel composer inserts into this ledger in the same persist step
//! that creates the tunnel row (§4.7 step 5); deleting a tunnel removes its
//! ledger rows too (§4.7 `delete`, §8 invariant 6).

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::entities::{ip_allocation, port_allocation};
use crate::error::{DbError, DbResult};

#[async_trait]
pub trait AllocationRepository: Send + Sync {
    async fn record_ip(&self, tunnel_id: i64, node_id: i64, ip_address: &str) -> DbResult<()>;
    async fn record_port(
        &self,
        tunnel_id: Option<i64>,
        service_id: Option<i64>,
        node_id: i64,
        port: i32,
        protocol: &str,
    ) -> DbResult<()>;
    async fn release_for_tunnel(&self, tunnel_id: i64) -> DbResult<()>;
    async fn release_for_service(&self, service_id: i64) -> DbResult<()>;
}

pub struct SeaOrmAllocationRepository {
    db: DatabaseConnection,
}

impl SeaOrmAllocationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AllocationRepository for SeaOrmAllocationRepository {
    async fn record_ip(&self, tunnel_id: i64, node_id: i64, ip_address: &str) -> DbResult<()> {
        let existing = ip_allocation::Entity::find()
            .filter(ip_allocation::Column::NodeId.eq(node_id))
            .filter(ip_allocation::Column::IpAddress.eq(ip_address))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(DbError::Conflict(format!(
                "ip {ip_address} already allocated on node {node_id}"
            )));
        }
        let am = ip_allocation::ActiveModel {
            tunnel_id: Set(tunnel_id),
            node_id: Set(node_id),
            ip_address: Set(ip_address.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        am.insert(&self.db).await?;
        Ok(())
    }

    async fn record_port(
        &self,
        tunnel_id: Option<i64>,
        service_id: Option<i64>,
        node_id: i64,
        port: i32,
        protocol: &str,
    ) -> DbResult<()> {
        let existing = port_allocation::Entity::find()
            .filter(port_allocation::Column::NodeId.eq(node_id))
            .filter(port_allocation::Column::Port.eq(port))
            .filter(port_allocation::Column::Protocol.eq(protocol))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(DbError::Conflict(format!(
                "port {port}/{protocol} already allocated on node {node_id}"
            )));
        }
        let am = port_allocation::ActiveModel {
            tunnel_id: Set(tunnel_id),
            service_id: Set(service_id),
            node_id: Set(node_id),
            port: Set(port),
            protocol: Set(protocol.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        am.insert(&self.db).await?;
        Ok(())
    }

    async fn release_for_tunnel(&self, tunnel_id: i64) -> DbResult<()> {
        ip_allocation::Entity::delete_many()
            .filter(ip_allocation::Column::TunnelId.eq(tunnel_id))
            .exec(&self.db)
            .await?;
        port_allocation::Entity::delete_many()
            .filter(port_allocation::Column::TunnelId.eq(tunnel_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn release_for_service(&self, service_id: i64) -> DbResult<()> {
        port_allocation::Entity::delete_many()
            .filter(port_allocation::Column::ServiceId.eq(service_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
