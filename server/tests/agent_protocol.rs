//! In-process integration tests for the agent protocol routes, driven with
//! `tower::ServiceExt::oneshot` against a hand-built `AppState` backed by
//! in-memory mock repositories instead of a real Postgres instance.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use async_trait::async_trait;
use netly_core::{
    AuthCipher, Bootstrapper, CleanupEngine, Composer, Config, FqdnAllocator, Ipam, KeyLocker,
    Portam, SharedTaskRegistry, TaskRegistry, Timeline,
};
use netly_db::entities::{node, service, timeline_event, tunnel};
use netly_db::repositories::{
    AllocationRepository, NewNode, NewService, NewTimelineEvent, NewTunnel, NodeRepository,
    ServiceRepository, SettingRepository, TimelineRepository, TunnelRepository,
};
use netly_db::DbResult;
use netly_server::AppState;

/// A single node, held in memory, mutable through interior mutability so
/// the trait's `&self` methods can update it.
struct MockNodeRepo {
    node: Mutex<node::Model>,
}

#[async_trait]
impl NodeRepository for MockNodeRepo {
    async fn create_or_restore(&self, _new: NewNode) -> DbResult<node::Model> {
        unimplemented!("not exercised by the agent protocol routes")
    }

    async fn get(&self, id: i64) -> DbResult<Option<node::Model>> {
        let node = self.node.lock().unwrap();
        Ok((node.id == id && node.deleted_at.is_none()).then(|| node.clone()))
    }

    async fn get_by_ip(&self, _ip: &str) -> DbResult<Option<node::Model>> {
        Ok(None)
    }

    async fn list(&self) -> DbResult<Vec<node::Model>> {
        Ok(vec![self.node.lock().unwrap().clone()])
    }

    async fn update_status(&self, id: i64, status: &str, last_log: Option<String>) -> DbResult<()> {
        let mut node = self.node.lock().unwrap();
        if node.id != id {
            return Err(netly_db::DbError::NotFound);
        }
        node.status = status.to_string();
        if let Some(log) = last_log {
            node.last_log = Some(log);
        }
        Ok(())
    }

    async fn update_stats(&self, id: i64, stats: serde_json::Value) -> DbResult<()> {
        let mut node = self.node.lock().unwrap();
        if node.id != id {
            return Err(netly_db::DbError::NotFound);
        }
        node.stats = stats;
        Ok(())
    }

    async fn update_wireguard_key(&self, id: i64, public_key: String) -> DbResult<()> {
        let mut node = self.node.lock().unwrap();
        if node.id != id {
            return Err(netly_db::DbError::NotFound);
        }
        node.wireguard_public_key = Some(public_key);
        Ok(())
    }

    async fn soft_delete(&self, id: i64) -> DbResult<()> {
        let mut node = self.node.lock().unwrap();
        if node.id != id {
            return Err(netly_db::DbError::NotFound);
        }
        node.deleted_at = Some(chrono::Utc::now());
        Ok(())
    }

    async fn hard_delete(&self, _id: i64) -> DbResult<()> {
        Ok(())
    }
}

struct MockTunnelRepo;

#[async_trait]
impl TunnelRepository for MockTunnelRepo {
    async fn create(&self, _new: NewTunnel) -> DbResult<tunnel::Model> {
        unimplemented!()
    }
    async fn get(&self, _id: i64) -> DbResult<Option<tunnel::Model>> {
        Ok(None)
    }
    async fn list_all(&self) -> DbResult<Vec<tunnel::Model>> {
        Ok(Vec::new())
    }
    async fn list_for_node(&self, _node_id: i64) -> DbResult<Vec<tunnel::Model>> {
        Ok(Vec::new())
    }
    async fn update_status(&self, _id: i64, _status: &str) -> DbResult<()> {
        Ok(())
    }
    async fn soft_delete(&self, _id: i64) -> DbResult<()> {
        Ok(())
    }
}

struct MockServiceRepo;

#[async_trait]
impl ServiceRepository for MockServiceRepo {
    async fn create(&self, _new: NewService) -> DbResult<service::Model> {
        unimplemented!()
    }
    async fn get(&self, _id: i64) -> DbResult<Option<service::Model>> {
        Ok(None)
    }
    async fn list_for_node(&self, _node_id: i64) -> DbResult<Vec<service::Model>> {
        Ok(Vec::new())
    }
    async fn list_all(&self) -> DbResult<Vec<service::Model>> {
        Ok(Vec::new())
    }
    async fn soft_delete(&self, _id: i64) -> DbResult<()> {
        Ok(())
    }
}

struct MockSettingRepo;

#[async_trait]
impl SettingRepository for MockSettingRepo {
    async fn get(&self, _key: &str) -> DbResult<Option<serde_json::Value>> {
        Ok(None)
    }
    async fn set(&self, _key: &str, _value: serde_json::Value) -> DbResult<()> {
        Ok(())
    }
}

struct MockAllocationRepo;

#[async_trait]
impl AllocationRepository for MockAllocationRepo {
    async fn record_ip(&self, _tunnel_id: i64, _node_id: i64, _ip_address: &str) -> DbResult<()> {
        Ok(())
    }
    async fn record_port(
        &self,
        _tunnel_id: Option<i64>,
        _service_id: Option<i64>,
        _node_id: i64,
        _port: i32,
        _protocol: &str,
    ) -> DbResult<()> {
        Ok(())
    }
    async fn release_for_tunnel(&self, _tunnel_id: i64) -> DbResult<()> {
        Ok(())
    }
    async fn release_for_service(&self, _service_id: i64) -> DbResult<()> {
        Ok(())
    }
}

struct MockTimelineRepo {
    next_id: AtomicI64,
}

#[async_trait]
impl TimelineRepository for MockTimelineRepo {
    async fn append(&self, event: NewTimelineEvent) -> DbResult<timeline_event::Model> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(timeline_event::Model {
            id,
            event_type: event.event_type,
            status: event.status,
            message: event.message,
            meta: event.meta,
            resource_type: event.resource_type,
            resource_id: event.resource_id,
            created_at: chrono::Utc::now(),
        })
    }
    async fn list_for_resource(
        &self,
        _resource_type: &str,
        _resource_id: i64,
    ) -> DbResult<Vec<timeline_event::Model>> {
        Ok(Vec::new())
    }
}

fn mock_node(id: i64) -> node::Model {
    let now = chrono::Utc::now();
    node::Model {
        id,
        name: format!("node-{id}"),
        ip: format!("10.0.0.{id}"),
        private_ip: None,
        ssh_port: 22,
        role: "entry".to_string(),
        status: "online".to_string(),
        auth_data: Vec::new(),
        wireguard_public_key: None,
        geo_data: serde_json::json!({}),
        stats: serde_json::json!({}),
        last_log: None,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

/// Builds an `AppState` wired the same way `AppState::new` does, but over
/// in-memory mocks instead of a live database connection.
fn test_state(node: node::Model) -> (AppState, SharedTaskRegistry) {
    let config = Arc::new(Config::default());

    let nodes: Arc<dyn NodeRepository> = Arc::new(MockNodeRepo {
        node: Mutex::new(node),
    });
    let tunnels: Arc<dyn TunnelRepository> = Arc::new(MockTunnelRepo);
    let services: Arc<dyn ServiceRepository> = Arc::new(MockServiceRepo);
    let settings: Arc<dyn SettingRepository> = Arc::new(MockSettingRepo);
    let allocations: Arc<dyn AllocationRepository> = Arc::new(MockAllocationRepo);
    let timeline_repo: Arc<dyn TimelineRepository> = Arc::new(MockTimelineRepo {
        next_id: AtomicI64::new(1),
    });

    let timeline = Timeline::new(timeline_repo.clone());
    let tasks: SharedTaskRegistry = Arc::new(TaskRegistry::new());
    let locker = KeyLocker::new();
    let ipam = Ipam::new(&config.ipam.ipv4_cidr).unwrap();
    let portam = Portam::new(config.portam.min_port, config.portam.max_port).unwrap();
    let cipher = AuthCipher::from_hex_key(&config.security.encryption_key).unwrap();
    let fqdn = Arc::new(FqdnAllocator::new(config.fqdn.base_domain.clone()));

    let composer = Arc::new(Composer {
        locker,
        ipam,
        portam,
        nodes: nodes.clone(),
        tunnels: tunnels.clone(),
        services: services.clone(),
        allocations: allocations.clone(),
        timeline: timeline.clone(),
        tasks: tasks.clone(),
    });

    let bootstrapper = Arc::new(Bootstrapper {
        nodes: nodes.clone(),
        cipher: cipher.clone(),
        timeline: timeline.clone(),
        tasks: tasks.clone(),
        agent_binary: Arc::new(Vec::new()),
        backend_url: config.security.public_url.clone(),
    });

    let cleanup = Arc::new(CleanupEngine {
        nodes: nodes.clone(),
        tunnels: tunnels.clone(),
        services: services.clone(),
        allocations: allocations.clone(),
        timeline,
        cipher,
    });

    let state = AppState {
        config,
        nodes,
        tunnels,
        services,
        settings,
        allocations,
        timeline: timeline_repo,
        tasks: tasks.clone(),
        composer,
        bootstrapper,
        cleanup,
        fqdn,
    };
    (state, tasks)
}

fn heartbeat_body() -> String {
    serde_json::json!({
        "stats": {
            "cpu_usage": 1.0,
            "ram_usage": 1.0,
            "ram_total": 1,
            "ram_used": 1,
            "uptime": 1,
            "network_rx": 0,
            "network_tx": 0,
            "hostname": "h",
            "os": "linux",
            "platform": "x86_64",
            "collected_at": 0
        },
        "agent_version": "0.1.0",
        "timestamp": 0
    })
    .to_string()
}

#[tokio::test]
async fn healthz_is_unauthenticated() {
    let (state, _tasks) = test_state(mock_node(1));
    let app = netly_server::router(state);

    let response = app
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn heartbeat_rejects_missing_auth() {
    let (state, _tasks) = test_state(mock_node(1));
    let app = netly_server::router(state);

    let response = app
        .oneshot(
            Request::post("/agent/heartbeat")
                .header("content-type", "application/json")
                .body(Body::from(heartbeat_body()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn heartbeat_delivers_queued_commands_and_updates_node() {
    let (state, tasks) = test_state(mock_node(7));
    let task = tasks.create_task("create_tunnel", serde_json::json!({}));
    tasks.create_command(
        &task.id,
        7,
        netly_protocol::CommandType::ApplyConfig,
        "{}".to_string(),
        0,
    );
    let app = netly_server::router(state);

    let response = app
        .oneshot(
            Request::post("/agent/heartbeat")
                .header("authorization", "Bearer node-token-7")
                .header("content-type", "application/json")
                .body(Body::from(heartbeat_body()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: netly_protocol::HeartbeatResponse = serde_json::from_slice(&bytes).unwrap();
    assert!(body.success);
    assert_eq!(body.commands.len(), 1);
    assert_eq!(body.commands[0].node_id, 7);

    // A second heartbeat sees no more pending commands — the queue drains.
    assert!(tasks.pending_commands(7).is_empty());
}

#[tokio::test]
async fn heartbeat_rejects_unknown_node() {
    let (state, _tasks) = test_state(mock_node(1));
    let app = netly_server::router(state);

    let response = app
        .oneshot(
            Request::post("/agent/heartbeat")
                .header("authorization", "Bearer node-token-99")
                .header("content-type", "application/json")
                .body(Body::from(heartbeat_body()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn register_persists_the_agent_generated_public_key() {
    let (state, _tasks) = test_state(mock_node(3));
    let nodes = state.nodes.clone();
    let app = netly_server::router(state);

    let body = serde_json::json!({ "public_key": "abc123=" }).to_string();
    let response = app
        .oneshot(
            Request::post("/agent/register")
                .header("authorization", "Bearer node-token-3")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let node = nodes.get(3).await.unwrap().unwrap();
    assert_eq!(node.wireguard_public_key.as_deref(), Some("abc123="));
}

#[tokio::test]
async fn command_result_updates_status_and_rejects_the_wrong_node() {
    let (state, tasks) = test_state(mock_node(1));
    let task = tasks.create_task("create_tunnel", serde_json::json!({}));
    let command = tasks.create_command(
        &task.id,
        1,
        netly_protocol::CommandType::ApplyConfig,
        "{}".to_string(),
        0,
    );
    let app = netly_server::router(state);

    let wrong_node_body = serde_json::json!({
        "command_id": command.id,
        "success": true,
        "output": "ok",
        "timestamp": 0
    })
    .to_string();
    let response = app
        .clone()
        .oneshot(
            Request::post("/agent/command/result")
                .header("authorization", "Bearer node-token-2")
                .header("content-type", "application/json")
                .body(Body::from(wrong_node_body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = serde_json::json!({
        "command_id": command.id,
        "success": false,
        "output": "ssh timed out",
        "timestamp": 0
    })
    .to_string();
    let response = app
        .oneshot(
            Request::post("/agent/command/result")
                .header("authorization", "Bearer node-token-1")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let record = tasks.get_command(command.id).unwrap();
    assert_eq!(record.status, netly_protocol::CommandStatus::Failed);
    assert_eq!(record.output.as_deref(), Some("ssh timed out"));
}
