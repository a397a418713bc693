//! §4.7 Tunnel composer — the orchestration for creating and tearing down
//! tunnels: lock acquisition, IPAM/PortAM allocation, protocol factory
//! invocation, persistence, command dispatch, and timeline recording.
//! Everything else in `netly-core` is a building block this module wires
//! together.

use std::sync::Arc;

use netly_db::entities::timeline_event::{EventStatus, ResourceType};
use netly_db::entities::tunnel;
use netly_db::repositories::{
    AllocationRepository, NewTunnel, NodeRepository, ServiceRepository, TunnelRepository,
};
use netly_protocol::{CommandPayload, CommandType};
use serde_json::json;

use crate::context::OpContext;
use crate::error::{CoreError, CoreResult};
use crate::ipam::Ipam;
use crate::locker::KeyLocker;
use crate::portam::Portam;
use crate::protocol_factory::{self, TunnelEndpoint};
use crate::tasks::{SharedTaskRegistry, TaskStatus};
use crate::timeline::Timeline;

const WIREGUARD_PORT_PROTOCOL: &str = "udp";
const APPLY_CONFIG_PRIORITY: i32 = 10;

pub struct Composer {
    pub locker: KeyLocker,
    pub ipam: Ipam,
    pub portam: Portam,
    pub nodes: Arc<dyn NodeRepository>,
    pub tunnels: Arc<dyn TunnelRepository>,
    pub services: Arc<dyn ServiceRepository>,
    pub allocations: Arc<dyn AllocationRepository>,
    pub timeline: Timeline,
    pub tasks: SharedTaskRegistry,
}

impl Composer {
    /// Creates a direct node-to-node tunnel: one `/30`, one port reserved on
    /// each endpoint, one `APPLY_CONFIG` command dispatched to each.
    pub async fn create_direct(
        &self,
        ctx: &OpContext,
        source_node_id: i64,
        dest_node_id: i64,
        name: &str,
    ) -> CoreResult<tunnel::Model> {
        if source_node_id == dest_node_id {
            return Err(CoreError::same_node());
        }

        let _guard = self
            .locker
            .lock([
                KeyLocker::node_key(source_node_id),
                KeyLocker::node_key(dest_node_id),
                KeyLocker::tunnel_key(source_node_id, dest_node_id),
            ])
            .await;

        let source = self.require_node(source_node_id).await?;
        let dest = self.require_node(dest_node_id).await?;

        let (v4, v6) = self.ipam.allocate(&*self.tunnels).await?;
        let (server_host, client_host) = Ipam::derive(&v4.subnet)?;
        let source_port = self.portam.reserve(source_node_id, &*self.tunnels, &*self.services).await?;
        let dest_port = self.portam.reserve(dest_node_id, &*self.tunnels, &*self.services).await?;

        let source_endpoint = TunnelEndpoint {
            internal_address: server_host.clone(),
            listen_port: source_port as u16,
            peer_public_key: dest
                .wireguard_public_key
                .clone()
                .unwrap_or_default(),
            peer_allowed_ips: client_host.clone(),
            peer_endpoint: None,
        };
        let dest_endpoint = TunnelEndpoint {
            internal_address: client_host.clone(),
            listen_port: dest_port as u16,
            peer_public_key: source
                .wireguard_public_key
                .clone()
                .unwrap_or_default(),
            peer_allowed_ips: server_host.clone(),
            peer_endpoint: Some(format!("{}:{}", source.endpoint_ip(), source_port)),
        };

        let source_config = protocol_factory::generate(&source_endpoint);
        let dest_config = protocol_factory::generate(&dest_endpoint);

        let tunnel = self
            .tunnels
            .create(NewTunnel {
                name: name.to_string(),
                protocol: "wireguard".to_string(),
                kind: "direct".to_string(),
                source_node_id,
                dest_node_id,
                source_port,
                dest_port,
                internal_ipv4: v4.subnet.clone(),
                internal_ipv6: v6.clone(),
                config: json!({"source": source_config, "dest": dest_config}),
                hops: json!([]),
                segments: json!({}),
            })
            .await
            .map_err(CoreError::from)?;

        self.allocations
            .record_ip(tunnel.id, source_node_id, &v4.subnet)
            .await
            .map_err(CoreError::from)?;
        self.allocations
            .record_port(Some(tunnel.id), None, source_node_id, source_port, WIREGUARD_PORT_PROTOCOL)
            .await
            .map_err(CoreError::from)?;
        self.allocations
            .record_port(Some(tunnel.id), None, dest_node_id, dest_port, WIREGUARD_PORT_PROTOCOL)
            .await
            .map_err(CoreError::from)?;

        self.timeline
            .record(
                ctx,
                "tunnel.create",
                EventStatus::Pending,
                format!("allocated {} between node {source_node_id} and node {dest_node_id}", v4.subnet),
                ResourceType::Tunnel,
                tunnel.id,
                json!({"kind": "direct"}),
            )
            .await;

        let task = self.tasks.create_task(
            "tunnel.create",
            json!({"tunnel_id": tunnel.id, "kind": "direct"}),
        );

        let interface_name = format!("netly-tun-{}", tunnel.id);
        self.dispatch_apply_config(&task.id, source_node_id, &interface_name, &source_config)?;
        self.dispatch_apply_config(&task.id, dest_node_id, &interface_name, &dest_config)?;

        self.tunnels
            .update_status(tunnel.id, "active")
            .await
            .map_err(CoreError::from)?;
        self.tasks.update_task(&task.id, TaskStatus::Succeeded);

        self.timeline
            .record(
                ctx,
                "tunnel.activate",
                EventStatus::Success,
                "dispatched apply_config to both endpoints",
                ResourceType::Tunnel,
                tunnel.id,
                json!({}),
            )
            .await;

        self.tunnels
            .get(tunnel.id)
            .await
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::Conflict("tunnel vanished immediately after creation".to_string()))
    }

    /// Creates a chain tunnel through every hop in order: an entry-to-relay
    /// segment, zero or more relay-to-relay segments, and a relay-to-exit
    /// segment, each with its own `/30` and reserved ports.
    pub async fn create_chain(
        &self,
        ctx: &OpContext,
        hop_node_ids: &[i64],
        name: &str,
    ) -> CoreResult<tunnel::Model> {
        if hop_node_ids.len() < 2 {
            return Err(CoreError::Validation(
                "a chain tunnel needs at least two hops".to_string(),
            ));
        }

        let mut lock_keys: Vec<String> = hop_node_ids.iter().map(|id| KeyLocker::node_key(*id)).collect();
        for pair in hop_node_ids.windows(2) {
            lock_keys.push(KeyLocker::tunnel_key(pair[0], pair[1]));
        }
        let _guard = self.locker.lock(lock_keys).await;

        let mut nodes = Vec::with_capacity(hop_node_ids.len());
        for &id in hop_node_ids {
            nodes.push(self.require_node(id).await?);
        }

        let mut segments = serde_json::Map::new();
        let mut endpoints_by_node: std::collections::HashMap<i64, Vec<TunnelEndpoint>> =
            std::collections::HashMap::new();
        let mut last_v4 = None;
        let mut last_v6 = None;

        for (idx, pair) in hop_node_ids.windows(2).enumerate() {
            let (server_id, client_id) = (pair[0], pair[1]);
            let server_node = &nodes[idx];
            let client_node = &nodes[idx + 1];

            let (v4, v6) = self.ipam.allocate(&*self.tunnels).await?;
            let (server_host, client_host) = Ipam::derive(&v4.subnet)?;
            let port = self
                .portam
                .reserve(server_id, &*self.tunnels, &*self.services)
                .await?;

            let server_endpoint = TunnelEndpoint {
                internal_address: server_host.clone(),
                listen_port: port as u16,
                peer_public_key: client_node.wireguard_public_key.clone().unwrap_or_default(),
                peer_allowed_ips: client_host.clone(),
                peer_endpoint: None,
            };
            let client_endpoint = TunnelEndpoint {
                internal_address: client_host.clone(),
                listen_port: port as u16,
                peer_public_key: server_node.wireguard_public_key.clone().unwrap_or_default(),
                peer_allowed_ips: server_host.clone(),
                peer_endpoint: Some(format!("{}:{}", server_node.endpoint_ip(), port)),
            };

            let segment_key = ((b'A' + idx as u8) as char).to_string();
            segments.insert(
                segment_key,
                json!({"server_node_id": server_id, "client_node_id": client_id, "port": port, "subnet": v4.subnet}),
            );

            endpoints_by_node.entry(server_id).or_default().push(server_endpoint);
            endpoints_by_node.entry(client_id).or_default().push(client_endpoint);

            last_v4 = Some(v4.subnet.clone());
            last_v6 = Some(v6.clone());
        }

        let tunnel = self
            .tunnels
            .create(NewTunnel {
                name: name.to_string(),
                protocol: "wireguard".to_string(),
                kind: "chain".to_string(),
                source_node_id: hop_node_ids[0],
                dest_node_id: *hop_node_ids.last().unwrap(),
                source_port: 0,
                dest_port: 0,
                internal_ipv4: last_v4.unwrap_or_default(),
                internal_ipv6: last_v6.unwrap_or_default(),
                config: json!({}),
                hops: json!(hop_node_ids),
                segments: serde_json::Value::Object(segments),
            })
            .await
            .map_err(CoreError::from)?;

        self.timeline
            .record(
                ctx,
                "tunnel.create",
                EventStatus::Pending,
                format!("chain through {} hops", hop_node_ids.len()),
                ResourceType::Tunnel,
                tunnel.id,
                json!({"kind": "chain"}),
            )
            .await;

        let task = self
            .tasks
            .create_task("tunnel.create", json!({"tunnel_id": tunnel.id, "kind": "chain"}));

        // A relay sits on two segments at once and must receive two
        // separate commands, one per interface (wg0, wg1, ...) — never a
        // single file with both blocks joined by the split sentinel.
        for (node_id, endpoints) in &endpoints_by_node {
            let joined = protocol_factory::generate_chain(endpoints);
            for (wg_idx, segment_config) in joined.split(protocol_factory::CHAIN_SEGMENT_SEPARATOR).enumerate() {
                let interface_name = format!("wg{wg_idx}");
                self.dispatch_apply_config(&task.id, *node_id, &interface_name, segment_config)?;
            }
        }

        self.tunnels
            .update_status(tunnel.id, "active")
            .await
            .map_err(CoreError::from)?;
        self.tasks.update_task(&task.id, TaskStatus::Succeeded);

        self.tunnels
            .get(tunnel.id)
            .await
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::Conflict("tunnel vanished immediately after creation".to_string()))
    }

    /// Soft-deletes a tunnel, releases its allocation ledger rows, and
    /// dispatches a `REMOVE_SERVICE`-style teardown... actually a
    /// `RemoveService`-shaped command is out of scope for a raw WireGuard
    /// interface; teardown here is limited to freeing the ledger and
    /// persistence state (§4.11 covers full agent-side cleanup).
    pub async fn delete(&self, ctx: &OpContext, tunnel_id: i64) -> CoreResult<()> {
        let tunnel = self
            .tunnels
            .get(tunnel_id)
            .await
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::Conflict(format!("tunnel {tunnel_id} not found")))?;

        let _guard = self
            .locker
            .lock([KeyLocker::tunnel_key(tunnel.source_node_id, tunnel.dest_node_id)])
            .await;

        self.tunnels.soft_delete(tunnel_id).await.map_err(CoreError::from)?;
        self.allocations
            .release_for_tunnel(tunnel_id)
            .await
            .map_err(CoreError::from)?;

        self.timeline
            .record(
                ctx,
                "tunnel.delete",
                EventStatus::Success,
                "removed",
                ResourceType::Tunnel,
                tunnel_id,
                json!({}),
            )
            .await;
        Ok(())
    }

    async fn require_node(&self, node_id: i64) -> CoreResult<netly_db::entities::node::Model> {
        self.nodes
            .get(node_id)
            .await
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::Conflict(format!("node {node_id} not found")))
    }

    /// Dispatches one `APPLY_CONFIG` command for a single WireGuard
    /// interface file (`/etc/wireguard/<interface_name>.conf`). Chain
    /// relays call this once per segment so each interface lands in its
    /// own command and file, never bundled together.
    fn dispatch_apply_config(
        &self,
        task_id: &str,
        node_id: i64,
        interface_name: &str,
        content: &str,
    ) -> CoreResult<()> {
        let payload = CommandPayload::ApplyConfig {
            target_path: format!("/etc/wireguard/{interface_name}.conf"),
            content: content.to_string(),
            service_name: Some(format!("wg-quick@{interface_name}")),
            backup: true,
            enable: true,
        };
        payload
            .validate()
            .map_err(|e| CoreError::Validation(format!("{interface_name} apply_config payload invalid: {e}")))?;
        let payload_json = serde_json::to_string(&payload)
            .map_err(|e| CoreError::Validation(format!("payload serialization failed: {e}")))?;
        self.tasks.create_command(
            task_id,
            node_id as u64,
            CommandType::ApplyConfig,
            payload_json,
            APPLY_CONFIG_PRIORITY,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use netly_db::entities::{node, service, tunnel};
    use netly_db::repositories::{NewNode, NewService};
    use netly_db::DbResult;

    use super::*;
    use crate::locker::KeyLocker;
    use crate::portam::Portam;
    use crate::tasks::TaskRegistry;

    struct MemNodes(StdMutex<HashMap<i64, node::Model>>);

    #[async_trait]
    impl NodeRepository for MemNodes {
        async fn create_or_restore(&self, _new: NewNode) -> DbResult<node::Model> {
            unimplemented!()
        }
        async fn get(&self, id: i64) -> DbResult<Option<node::Model>> {
            Ok(self.0.lock().unwrap().get(&id).cloned())
        }
        async fn get_by_ip(&self, _ip: &str) -> DbResult<Option<node::Model>> {
            Ok(None)
        }
        async fn list(&self) -> DbResult<Vec<node::Model>> {
            Ok(self.0.lock().unwrap().values().cloned().collect())
        }
        async fn update_status(&self, _id: i64, _status: &str, _last_log: Option<String>) -> DbResult<()> {
            Ok(())
        }
        async fn update_stats(&self, _id: i64, _stats: serde_json::Value) -> DbResult<()> {
            Ok(())
        }
        async fn update_wireguard_key(&self, _id: i64, _public_key: String) -> DbResult<()> {
            Ok(())
        }
        async fn soft_delete(&self, _id: i64) -> DbResult<()> {
            Ok(())
        }
        async fn hard_delete(&self, _id: i64) -> DbResult<()> {
            Ok(())
        }
    }

    struct MemTunnels {
        rows: StdMutex<Vec<tunnel::Model>>,
        next_id: AtomicI64,
    }

    impl MemTunnels {
        fn new() -> Self {
            Self {
                rows: StdMutex::new(Vec::new()),
                next_id: AtomicI64::new(1),
            }
        }
    }

    #[async_trait]
    impl TunnelRepository for MemTunnels {
        async fn create(&self, new: NewTunnel) -> DbResult<tunnel::Model> {
            let now = chrono::Utc::now();
            let row = tunnel::Model {
                id: self.next_id.fetch_add(1, Ordering::Relaxed),
                name: new.name,
                protocol: new.protocol,
                kind: new.kind,
                source_node_id: new.source_node_id,
                dest_node_id: new.dest_node_id,
                source_port: new.source_port,
                dest_port: new.dest_port,
                internal_ipv4: new.internal_ipv4,
                internal_ipv6: new.internal_ipv6,
                config: new.config,
                hops: new.hops,
                segments: new.segments,
                status: "pending".to_string(),
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            self.rows.lock().unwrap().push(row.clone());
            Ok(row)
        }
        async fn get(&self, id: i64) -> DbResult<Option<tunnel::Model>> {
            Ok(self.rows.lock().unwrap().iter().find(|t| t.id == id).cloned())
        }
        async fn list_all(&self) -> DbResult<Vec<tunnel::Model>> {
            Ok(self.rows.lock().unwrap().iter().filter(|t| t.deleted_at.is_none()).cloned().collect())
        }
        async fn list_for_node(&self, node_id: i64) -> DbResult<Vec<tunnel::Model>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.source_node_id == node_id || t.dest_node_id == node_id)
                .cloned()
                .collect())
        }
        async fn update_status(&self, id: i64, status: &str) -> DbResult<()> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows.iter_mut().find(|t| t.id == id).ok_or(netly_db::DbError::NotFound)?;
            row.status = status.to_string();
            Ok(())
        }
        async fn soft_delete(&self, id: i64) -> DbResult<()> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows.iter_mut().find(|t| t.id == id).ok_or(netly_db::DbError::NotFound)?;
            row.deleted_at = Some(chrono::Utc::now());
            Ok(())
        }
    }

    struct MemServices;

    #[async_trait]
    impl ServiceRepository for MemServices {
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

    struct MemAllocations {
        released: StdMutex<Vec<i64>>,
    }

    #[async_trait]
    impl AllocationRepository for MemAllocations {
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
        async fn release_for_tunnel(&self, tunnel_id: i64) -> DbResult<()> {
            self.released.lock().unwrap().push(tunnel_id);
            Ok(())
        }
        async fn release_for_service(&self, _service_id: i64) -> DbResult<()> {
            Ok(())
        }
    }

    struct MemTimeline;

    #[async_trait]
    impl netly_db::repositories::TimelineRepository for MemTimeline {
        async fn append(
            &self,
            event: netly_db::repositories::NewTimelineEvent,
        ) -> DbResult<netly_db::entities::timeline_event::Model> {
            Ok(netly_db::entities::timeline_event::Model {
                id: 1,
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
        ) -> DbResult<Vec<netly_db::entities::timeline_event::Model>> {
            Ok(Vec::new())
        }
    }

    fn mock_node(id: i64, ip: &str, pubkey: &str) -> node::Model {
        let now = chrono::Utc::now();
        node::Model {
            id,
            name: format!("node-{id}"),
            ip: ip.to_string(),
            private_ip: None,
            ssh_port: 22,
            role: "entry".to_string(),
            status: "online".to_string(),
            auth_data: Vec::new(),
            wireguard_public_key: Some(pubkey.to_string()),
            geo_data: json!({}),
            stats: json!({}),
            last_log: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn test_composer(nodes: Vec<node::Model>) -> Composer {
        let mut by_id = HashMap::new();
        for n in nodes {
            by_id.insert(n.id, n);
        }
        let timeline_repo: Arc<dyn netly_db::repositories::TimelineRepository> = Arc::new(MemTimeline);
        Composer {
            locker: KeyLocker::new(),
            ipam: Ipam::new("10.200.0.0/16").unwrap(),
            portam: Portam::new(20000, 21000).unwrap(),
            nodes: Arc::new(MemNodes(StdMutex::new(by_id))),
            tunnels: Arc::new(MemTunnels::new()),
            services: Arc::new(MemServices),
            allocations: Arc::new(MemAllocations {
                released: StdMutex::new(Vec::new()),
            }),
            timeline: Timeline::new(timeline_repo),
            tasks: Arc::new(TaskRegistry::new()),
        }
    }

    fn ctx() -> OpContext {
        OpContext::with_timeout(Duration::from_secs(30))
    }

    /// S1: direct WireGuard tunnel, happy path.
    #[tokio::test]
    async fn create_direct_allocates_and_activates() {
        let composer = test_composer(vec![
            mock_node(1, "10.1.1.1", "PA"),
            mock_node(2, "10.1.1.2", "PB"),
        ]);

        let tunnel = composer
            .create_direct(&ctx(), 1, 2, "t1")
            .await
            .expect("direct tunnel creation should succeed");

        assert_eq!(tunnel.internal_ipv4, "10.200.0.4/30");
        assert_eq!(tunnel.status, "active");
        assert!((20000..21000).contains(&tunnel.source_port));
        assert!((20000..21000).contains(&tunnel.dest_port));
        assert_ne!(tunnel.source_port, tunnel.dest_port);

        let dest_config = tunnel.config["dest"].as_str().unwrap();
        assert!(dest_config.contains("Address = 10.200.0.5/30"));
        assert!(dest_config.contains("PublicKey = PA"));
        assert!(dest_config.contains(&format!("Endpoint = 10.1.1.1:{}", tunnel.source_port)));

        let source_config = tunnel.config["source"].as_str().unwrap();
        assert!(source_config.contains("Address = 10.200.0.6/30"));
        assert!(source_config.contains("PublicKey = PB"));
        assert!(!source_config.contains("Endpoint ="));

        let commands = composer.tasks.pending_commands(1);
        assert_eq!(commands.len(), 1);
        let commands = composer.tasks.pending_commands(2);
        assert_eq!(commands.len(), 1);
    }

    /// S2: chain tunnel through three hops.
    #[tokio::test]
    async fn create_chain_allocates_one_segment_per_hop_pair() {
        let composer = test_composer(vec![
            mock_node(1, "10.1.1.1", "P1"),
            mock_node(2, "10.1.1.2", "P2"),
            mock_node(3, "10.1.1.3", "P3"),
        ]);

        let tunnel = composer
            .create_chain(&ctx(), &[1, 2, 3], "chain1")
            .await
            .expect("chain tunnel creation should succeed");

        assert_eq!(tunnel.kind, "chain");
        assert_eq!(tunnel.status, "active");
        assert_eq!(tunnel.hops, json!([1, 2, 3]));
        let segments = tunnel.segments.as_object().unwrap();
        assert_eq!(segments.len(), 2);
        assert!(segments.contains_key("A"));
        assert!(segments.contains_key("B"));

        // Relay (2) participates in both segments, so it gets two separate
        // commands, one per wg interface (wg0, wg1); entry (1) and exit (3)
        // each get just the one command for their single interface.
        assert_eq!(composer.tasks.pending_commands(2).len(), 2);
        assert_eq!(composer.tasks.pending_commands(1).len(), 1);
        assert_eq!(composer.tasks.pending_commands(3).len(), 1);
    }

    /// S3: same-node rejection — no allocation side effects.
    #[tokio::test]
    async fn create_direct_rejects_same_node() {
        let composer = test_composer(vec![mock_node(1, "10.1.1.1", "PA")]);

        let err = composer.create_direct(&ctx(), 1, 1, "bad").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
        assert!(composer.tunnels.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_releases_allocations_and_soft_deletes() {
        let composer = test_composer(vec![
            mock_node(1, "10.1.1.1", "PA"),
            mock_node(2, "10.1.1.2", "PB"),
        ]);
        let tunnel = composer.create_direct(&ctx(), 1, 2, "t1").await.unwrap();

        composer.delete(&ctx(), tunnel.id).await.unwrap();

        let reloaded = composer.tunnels.get(tunnel.id).await.unwrap().unwrap();
        assert!(reloaded.deleted_at.is_some());
    }
}
