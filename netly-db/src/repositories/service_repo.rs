//! Service repository — §3 Service.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::entities::service;
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct NewService {
    pub name: String,
    pub protocol: String,
    pub node_id: i64,
    pub listen_port: i32,
    pub routing_mode: String,
    pub config: serde_json::Value,
}

#[async_trait]
pub trait ServiceRepository: Send + Sync {
    async fn create(&self, new: NewService) -> DbResult<service::Model>;
    async fn get(&self, id: i64) -> DbResult<Option<service::Model>>;
    async fn list_for_node(&self, node_id: i64) -> DbResult<Vec<service::Model>>;
    async fn list_all(&self) -> DbResult<Vec<service::Model>>;
    async fn soft_delete(&self, id: i64) -> DbResult<()>;
}

pub struct SeaOrmServiceRepository {
    db: DatabaseConnection,
}

impl SeaOrmServiceRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ServiceRepository for SeaOrmServiceRepository {
    async fn create(&self, new: NewService) -> DbResult<service::Model> {
        let existing = service::Entity::find()
            .filter(service::Column::NodeId.eq(new.node_id))
            .filter(service::Column::ListenPort.eq(new.listen_port))
            .filter(service::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(DbError::Conflict(format!(
                "port {} already in use on node {}",
                new.listen_port, new.node_id
            )));
        }

        let now = Utc::now();
        let am = service::ActiveModel {
            name: Set(new.name),
            protocol: Set(new.protocol),
            node_id: Set(new.node_id),
            listen_port: Set(new.listen_port),
            routing_mode: Set(new.routing_mode),
            config: Set(new.config),
            status: Set("pending".to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        };
        Ok(am.insert(&self.db).await?)
    }

    async fn get(&self, id: i64) -> DbResult<Option<service::Model>> {
        Ok(service::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn list_for_node(&self, node_id: i64) -> DbResult<Vec<service::Model>> {
        Ok(service::Entity::find()
            .filter(service::Column::NodeId.eq(node_id))
            .filter(service::Column::DeletedAt.is_null())
            .all(&self.db)
            .await?)
    }

    async fn list_all(&self) -> DbResult<Vec<service::Model>> {
        Ok(service::Entity::find()
            .filter(service::Column::DeletedAt.is_null())
            .all(&self.db)
            .await?)
    }

    async fn soft_delete(&self, id: i64) -> DbResult<()> {
        let row = service::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DbError::NotFound)?;
        let mut am: service::ActiveModel = row.into();
        am.deleted_at = Set(Some(Utc::now()));
        am.update(&self.db).await?;
        Ok(())
    }
}
