//! Timeline repository — §3 TimelineEvent, §7 "best effort" write policy.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::entities::timeline_event;
use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct NewTimelineEvent {
    pub event_type: String,
    pub status: String,
    pub message: String,
    pub meta: serde_json::Value,
    pub resource_type: String,
    pub resource_id: i64,
}

#[async_trait]
pub trait TimelineRepository: Send + Sync {
    async fn append(&self, event: NewTimelineEvent) -> DbResult<timeline_event::Model>;
    async fn list_for_resource(
        &self,
        resource_type: &str,
        resource_id: i64,
    ) -> DbResult<Vec<timeline_event::Model>>;
}

pub struct SeaOrmTimelineRepository {
    db: DatabaseConnection,
}

impl SeaOrmTimelineRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TimelineRepository for SeaOrmTimelineRepository {
    async fn append(&self, event: NewTimelineEvent) -> DbResult<timeline_event::Model> {
        let am = timeline_event::ActiveModel {
            event_type: Set(event.event_type),
            status: Set(event.status),
            message: Set(event.message),
            meta: Set(event.meta),
            resource_type: Set(event.resource_type),
            resource_id: Set(event.resource_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        Ok(am.insert(&self.db).await?)
    }

    async fn list_for_resource(
        &self,
        resource_type: &str,
        resource_id: i64,
    ) -> DbResult<Vec<timeline_event::Model>> {
        Ok(timeline_event::Entity::find()
            .filter(timeline_event::Column::ResourceType.eq(resource_type))
            .filter(timeline_event::Column::ResourceId.eq(resource_id))
            .all(&self.db)
            .await?)
    }
}
