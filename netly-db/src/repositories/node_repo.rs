//! Node repository — §3 Node, §9 soft-delete restore.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use crate::entities::node;
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct NewNode {
    pub name: String,
    pub ip: String,
    pub private_ip: Option<String>,
    pub ssh_port: i32,
    pub role: String,
    pub auth_data: Vec<u8>,
    pub wireguard_public_key: Option<String>,
    pub geo_data: serde_json::Value,
}

#[async_trait]
pub trait NodeRepository: Send + Sync {
    /// Inserts a new node, or — if a soft-deleted row with the same `ip`
    /// exists — restores that row in place with the new authentication
    /// data, preserving its id (§9: tunnel records reference node ids).
    async fn create_or_restore(&self, new: NewNode) -> DbResult<node::Model>;
    async fn get(&self, id: i64) -> DbResult<Option<node::Model>>;
    async fn get_by_ip(&self, ip: &str) -> DbResult<Option<node::Model>>;
    async fn list(&self) -> DbResult<Vec<node::Model>>;
    async fn update_status(
        &self,
        id: i64,
        status: &str,
        last_log: Option<String>,
    ) -> DbResult<()>;
    async fn update_stats(&self, id: i64, stats: serde_json::Value) -> DbResult<()>;
    /// Records the WireGuard public key an agent generated for itself on
    /// first boot (§9: the control plane never generates node keypairs).
    async fn update_wireguard_key(&self, id: i64, public_key: String) -> DbResult<()>;
    async fn soft_delete(&self, id: i64) -> DbResult<()>;
    async fn hard_delete(&self, id: i64) -> DbResult<()>;
}

pub struct SeaOrmNodeRepository {
    db: DatabaseConnection,
}

impl SeaOrmNodeRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NodeRepository for SeaOrmNodeRepository {
    async fn create_or_restore(&self, new: NewNode) -> DbResult<node::Model> {
        let existing = node::Entity::find()
            .filter(node::Column::Ip.eq(new.ip.clone()))
            .one(&self.db)
            .await?;

        if let Some(row) = existing {
            if row.deleted_at.is_none() {
                return Err(DbError::Conflict(format!(
                    "ip `{}` already belongs to node {}",
                    new.ip, row.id
                )));
            }
            let mut am: node::ActiveModel = row.into();
            am.name = Set(new.name);
            am.private_ip = Set(new.private_ip);
            am.ssh_port = Set(new.ssh_port);
            am.role = Set(new.role);
            am.status = Set("pending".to_string());
            am.auth_data = Set(new.auth_data);
            am.wireguard_public_key = Set(new.wireguard_public_key);
            am.geo_data = Set(new.geo_data);
            am.last_log = Set(None);
            am.updated_at = Set(Utc::now());
            am.deleted_at = Set(None);
            let restored = am.update(&self.db).await?;
            return Ok(restored);
        }

        let now = Utc::now();
        let am = node::ActiveModel {
            name: Set(new.name),
            ip: Set(new.ip),
            private_ip: Set(new.private_ip),
            ssh_port: Set(new.ssh_port),
            role: Set(new.role),
            status: Set("pending".to_string()),
            auth_data: Set(new.auth_data),
            wireguard_public_key: Set(new.wireguard_public_key),
            geo_data: Set(new.geo_data),
            stats: Set(serde_json::json!({})),
            last_log: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        };
        Ok(am.insert(&self.db).await?)
    }

    async fn get(&self, id: i64) -> DbResult<Option<node::Model>> {
        Ok(node::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn get_by_ip(&self, ip: &str) -> DbResult<Option<node::Model>> {
        Ok(node::Entity::find()
            .filter(node::Column::Ip.eq(ip))
            .filter(node::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?)
    }

    async fn list(&self) -> DbResult<Vec<node::Model>> {
        Ok(node::Entity::find()
            .filter(node::Column::DeletedAt.is_null())
            .all(&self.db)
            .await?)
    }

    async fn update_status(
        &self,
        id: i64,
        status: &str,
        last_log: Option<String>,
    ) -> DbResult<()> {
        let row = node::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DbError::NotFound)?;
        let mut am: node::ActiveModel = row.into();
        am.status = Set(status.to_string());
        if let Some(log) = last_log {
            am.last_log = Set(Some(log));
        }
        am.updated_at = Set(Utc::now());
        am.update(&self.db).await?;
        Ok(())
    }

    async fn update_stats(&self, id: i64, stats: serde_json::Value) -> DbResult<()> {
        let row = node::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DbError::NotFound)?;
        let mut am: node::ActiveModel = row.into();
        am.stats = Set(stats);
        am.updated_at = Set(Utc::now());
        am.update(&self.db).await?;
        Ok(())
    }

    async fn update_wireguard_key(&self, id: i64, public_key: String) -> DbResult<()> {
        let row = node::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DbError::NotFound)?;
        let mut am: node::ActiveModel = row.into();
        am.wireguard_public_key = Set(Some(public_key));
        am.updated_at = Set(Utc::now());
        am.update(&self.db).await?;
        Ok(())
    }

    async fn soft_delete(&self, id: i64) -> DbResult<()> {
        let row = node::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DbError::NotFound)?;
        let mut am: node::ActiveModel = row.into();
        am.deleted_at = Set(Some(Utc::now()));
        am.update(&self.db).await?;
        Ok(())
    }

    async fn hard_delete(&self, id: i64) -> DbResult<()> {
        node::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(())
    }
}
