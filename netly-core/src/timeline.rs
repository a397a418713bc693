//! §3/§7 timeline sink — a best-effort wrapper over `TimelineRepository`.
//! A write failure here is logged and swallowed: the calling operation's
//! own result must never depend on whether its audit trail landed.

use std::sync::Arc;

use netly_db::entities::timeline_event::{EventStatus, ResourceType};
use netly_db::repositories::{NewTimelineEvent, TimelineRepository};
use serde_json::Value;
use tracing::warn;

use crate::context::OpContext;

#[derive(Clone)]
pub struct Timeline {
    repo: Arc<dyn TimelineRepository>,
}

impl Timeline {
    pub fn new(repo: Arc<dyn TimelineRepository>) -> Self {
        Self { repo }
    }

    pub async fn record(
        &self,
        ctx: &OpContext,
        event_type: &str,
        status: EventStatus,
        message: impl Into<String>,
        resource_type: ResourceType,
        resource_id: i64,
        meta: Value,
    ) {
        let event = NewTimelineEvent {
            event_type: event_type.to_string(),
            status: status.as_str().to_string(),
            message: message.into(),
            meta: ctx.meta(meta),
            resource_type: resource_type.as_str().to_string(),
            resource_id,
        };
        if let Err(e) = self.repo.append(event).await {
            warn!(
                error = %e,
                event_type,
                resource_type = resource_type.as_str(),
                resource_id,
                "failed to append timeline event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use netly_db::entities::timeline_event;
    use netly_db::error::DbResult;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingRepo {
        events: StdMutex<Vec<NewTimelineEvent>>,
    }

    #[async_trait]
    impl TimelineRepository for RecordingRepo {
        async fn append(&self, event: NewTimelineEvent) -> DbResult<timeline_event::Model> {
            let model = timeline_event::Model {
                id: 1,
                event_type: event.event_type.clone(),
                status: event.status.clone(),
                message: event.message.clone(),
                meta: event.meta.clone(),
                resource_type: event.resource_type.clone(),
                resource_id: event.resource_id,
                created_at: chrono::Utc::now(),
            };
            self.events.lock().unwrap().push(event);
            Ok(model)
        }

        async fn list_for_resource(
            &self,
            _resource_type: &str,
            _resource_id: i64,
        ) -> DbResult<Vec<timeline_event::Model>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn record_merges_request_and_task_ids_into_meta() {
        let repo = Arc::new(RecordingRepo::default());
        let timeline = Timeline::new(repo.clone());
        let ctx = OpContext::default()
            .with_request_id("req-1".to_string())
            .with_task_id("task-1".to_string());

        timeline
            .record(
                &ctx,
                "tunnel.create",
                EventStatus::Success,
                "created",
                ResourceType::Tunnel,
                42,
                serde_json::json!({"kind": "direct"}),
            )
            .await;

        let events = repo.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].meta["request_id"], "req-1");
        assert_eq!(events[0].meta["task_id"], "task-1");
        assert_eq!(events[0].meta["kind"], "direct");
    }
}
