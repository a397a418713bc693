//! §4.3 PortAM — hands out (node, protocol) unique ports from a closed
//! interval.

use std::collections::HashSet;
use std::sync::Arc;

use netly_db::entities::tunnel;
use netly_db::repositories::{ServiceRepository, TunnelRepository};
use rand::Rng;
use tokio::sync::Mutex;

use crate::error::{CoreError, CoreResult};

#[derive(Clone)]
pub struct Portam {
    min: i32,
    max: i32,
    guard: Arc<Mutex<()>>,
}

impl Portam {
    pub fn new(min: u16, max: u16) -> CoreResult<Self> {
        if min >= max {
            return Err(CoreError::Validation(format!(
                "portam range is empty: [{min}, {max}]"
            )));
        }
        Ok(Self {
            min: min as i32,
            max: max as i32,
            guard: Arc::new(Mutex::new(())),
        })
    }

    /// Picks a port on `node_id` not currently held by any active tunnel
    /// touching that node (as source, dest, or chain segment endpoint) or
    /// any service on that node: first with 100 random attempts, then by
    /// linear scan.
    pub async fn reserve(
        &self,
        node_id: i64,
        tunnels: &dyn TunnelRepository,
        services: &dyn ServiceRepository,
    ) -> CoreResult<i32> {
        let _permit = self.guard.lock().await;

        let mut used: HashSet<i32> = HashSet::new();
        for t in tunnels.list_for_node(node_id).await.map_err(CoreError::from)? {
            used.extend(ports_used_on_node(&t, node_id));
        }
        for s in services.list_for_node(node_id).await.map_err(CoreError::from)? {
            used.insert(s.listen_port);
        }

        let total = (self.max - self.min + 1) as usize;
        if used.len() >= total {
            return Err(CoreError::no_ports());
        }

        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let candidate = rng.gen_range(self.min..=self.max);
            if !used.contains(&candidate) {
                return Ok(candidate);
            }
        }

        for candidate in self.min..=self.max {
            if !used.contains(&candidate) {
                return Ok(candidate);
            }
        }

        Err(CoreError::no_ports())
    }

    /// No-op: allocations are implicit in the tunnel/service record
    /// (§4.3, same reasoning as IPAM).
    pub fn release(&self, _node_id: i64, _port: i32) {}
}

/// Ports `node_id` is holding through `t`, whether as the direct
/// source/dest endpoint or as a chain segment's listening side. The
/// `segments` JSON map (§3) stores one object per segment keyed `"A"`/`"B"`
/// with `server_node_id` and `port` fields for the relay/exit legs of a
/// chain tunnel (§4.6).
fn ports_used_on_node(t: &tunnel::Model, node_id: i64) -> Vec<i32> {
    let mut ports = Vec::new();
    if t.source_node_id == node_id {
        ports.push(t.source_port);
    }
    if t.dest_node_id == node_id {
        ports.push(t.dest_port);
    }
    if let Some(segments) = t.segments.as_object() {
        for seg in segments.values() {
            let server_node_id = seg.get("server_node_id").and_then(|v| v.as_i64());
            let port = seg.get("port").and_then(|v| v.as_i64());
            if let (Some(sid), Some(p)) = (server_node_id, port) {
                if sid == node_id {
                    ports.push(p as i32);
                }
            }
        }
    }
    ports
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tunnel_with(source: i64, dest: i64, sport: i32, dport: i32) -> tunnel::Model {
        tunnel::Model {
            id: 1,
            name: "t".into(),
            protocol: "wireguard".into(),
            kind: "direct".into(),
            source_node_id: source,
            dest_node_id: dest,
            source_port: sport,
            dest_port: dport,
            internal_ipv4: "10.200.0.4/30".into(),
            internal_ipv6: "fd00::1:1/64".into(),
            config: serde_json::json!({}),
            hops: serde_json::json!([]),
            segments: serde_json::json!({}),
            status: "active".into(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn ports_used_on_node_finds_both_sides() {
        let t = tunnel_with(1, 2, 20000, 20001);
        assert_eq!(ports_used_on_node(&t, 1), vec![20000]);
        assert_eq!(ports_used_on_node(&t, 2), vec![20001]);
        assert_eq!(ports_used_on_node(&t, 3), Vec::<i32>::new());
    }

    #[test]
    fn ports_used_on_node_reads_segment_ports() {
        let mut t = tunnel_with(1, 3, 20000, 20002);
        t.segments = serde_json::json!({
            "A": {"server_node_id": 2, "port": 20010},
            "B": {"server_node_id": 3, "port": 20002},
        });
        assert_eq!(ports_used_on_node(&t, 2), vec![20010]);
    }
}
