//! §4.2 IPAM — hands out /30 IPv4 subnets and /64 IPv6 ULAs.

use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::Arc;

use ipnet::Ipv4Net;
use netly_db::repositories::TunnelRepository;
use tokio::sync::Mutex;

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone)]
pub struct IpamConfig {
    pub ipv4_cidr: Ipv4Net,
}

#[derive(Clone)]
pub struct Ipam {
    config: IpamConfig,
    /// Serializes allocation against concurrent creates on disjoint node
    /// pairs (§4.2 edge cases; §5 ordering guarantees).
    guard: Arc<Mutex<()>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Allocation {
    pub subnet: String, // e.g. "10.200.0.4/30"
}

impl Ipam {
    pub fn new(ipv4_cidr: &str) -> CoreResult<Self> {
        let net = Ipv4Net::from_str(ipv4_cidr)
            .map_err(|e| CoreError::Validation(format!("invalid ipv4 pool `{ipv4_cidr}`: {e}")))?;
        Ok(Self {
            config: IpamConfig { ipv4_cidr: net },
            guard: Arc::new(Mutex::new(())),
        })
    }

    /// Allocates one /30 and one /64. `tunnels` is consulted to find the
    /// highest base currently in use; `tunnel_count` seeds the IPv6
    /// suffix, per §4.2.
    pub async fn allocate(
        &self,
        tunnels: &dyn TunnelRepository,
    ) -> CoreResult<(Ipv4Allocation, String)> {
        let _permit = self.guard.lock().await;

        let existing = tunnels.list_all().await.map_err(CoreError::from)?;
        let pool_start = u32::from(self.config.ipv4_cidr.network()) + 4;

        let highest_base = existing
            .iter()
            .filter_map(|t| Ipv4Net::from_str(&t.internal_ipv4).ok())
            .map(|n| u32::from(n.network()))
            .max();

        let next_base = match highest_base {
            Some(h) => {
                let candidate = h + 4;
                // Round up to the next 4-address boundary in case stored
                // data was ever written with a misaligned base.
                (candidate + 3) & !3
            }
            None => pool_start,
        };

        let candidate_net = Ipv4Net::new(Ipv4Addr::from(next_base), 30)
            .map_err(|_| CoreError::range_exhausted())?;

        if !self.config.ipv4_cidr.contains(&candidate_net)
            || u32::from(candidate_net.broadcast()) > u32::from(self.config.ipv4_cidr.broadcast())
        {
            return Err(CoreError::range_exhausted());
        }

        let v6 = format!("fd00::{}:1/64", existing.len() + 1);

        Ok((
            Ipv4Allocation {
                subnet: candidate_net.to_string(),
            },
            v6,
        ))
    }

    /// No-op: allocations are implicit in the tunnel record, so deleting
    /// the tunnel releases them (§4.2).
    pub fn release(&self, _v4: &str, _v6: &str) {}

    /// Derives the two usable host addresses of a /30: server is
    /// `base+1`, client is `base+2`.
    pub fn derive(cidr: &str) -> CoreResult<(String, String)> {
        let net = Ipv4Net::from_str(cidr)
            .map_err(|e| CoreError::Validation(format!("invalid /30 `{cidr}`: {e}")))?;
        if net.prefix_len() != 30 {
            return Err(CoreError::Validation(format!(
                "expected a /30, got `{cidr}`"
            )));
        }
        let base = u32::from(net.network());
        let server = Ipv4Addr::from(base + 1);
        let client = Ipv4Addr::from(base + 2);
        Ok((format!("{server}/30"), format!("{client}/30")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_yields_distinct_hosts_inside_the_subnet() {
        let (server, client) = Ipam::derive("10.200.0.4/30").unwrap();
        assert_eq!(server, "10.200.0.5/30");
        assert_eq!(client, "10.200.0.6/30");
        assert_ne!(server, client);

        // Round-trip: re-parsing either host at /30 recovers the same subnet.
        let server_net = Ipv4Net::from_str(&server).unwrap().trunc();
        let client_net = Ipv4Net::from_str(&client).unwrap().trunc();
        assert_eq!(server_net.to_string(), "10.200.0.4/30");
        assert_eq!(client_net.to_string(), "10.200.0.4/30");
    }

    #[test]
    fn derive_rejects_non_30_prefix() {
        assert!(Ipam::derive("10.200.0.0/29").is_err());
    }
}
