//! §5: the ambient context every public operation accepts, carrying a
//! deadline and the correlation identifiers copied into every timeline
//! event (§3).

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct OpContext {
    deadline: Instant,
    pub request_id: Option<String>,
    pub task_id: Option<String>,
}

impl OpContext {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            request_id: None,
            task_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Merges `request_id`/`task_id` into a timeline event's `meta` map,
    /// per §3's requirement that correlation keys always be present when
    /// they exist in the ambient context.
    pub fn meta(&self, mut base: serde_json::Value) -> serde_json::Value {
        if let Some(obj) = base.as_object_mut() {
            if let Some(rid) = &self.request_id {
                obj.insert("request_id".to_string(), serde_json::json!(rid));
            }
            if let Some(tid) = &self.task_id {
                obj.insert("task_id".to_string(), serde_json::json!(tid));
            }
        }
        base
    }
}

impl Default for OpContext {
    fn default() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_omits_correlation_keys_when_absent() {
        let ctx = OpContext::default();
        let meta = ctx.meta(serde_json::json!({"kind": "direct"}));
        assert!(meta.get("request_id").is_none());
        assert!(meta.get("task_id").is_none());
    }

    #[test]
    fn with_timeout_expires_after_its_duration() {
        let ctx = OpContext::with_timeout(Duration::from_millis(0));
        assert!(ctx.is_expired());
        assert_eq!(ctx.remaining(), Duration::ZERO);
    }
}
