//! §4.6 Protocol factory — pure WireGuard config generation. No I/O, no
//! allocation, no persistence: every function here is a total function of
//! its arguments, so the composer (`composer.rs`) can call it after
//! allocation and before dispatch without re-touching IPAM/PortAM.

const PERSISTENT_KEEPALIVE_SECS: u32 = 25;
pub const CHAIN_SEGMENT_SEPARATOR: &str = "\n\n---SPLIT---\n\n";

/// One side of a WireGuard peering: this node's listen port and address,
/// and the peer it dials or accepts from.
#[derive(Debug, Clone)]
pub struct TunnelEndpoint {
    pub internal_address: String,
    pub listen_port: u16,
    pub peer_public_key: String,
    pub peer_allowed_ips: String,
    /// `Some("host:port")` when this side dials the peer; `None` when this
    /// side only listens (the peer dials in).
    pub peer_endpoint: Option<String>,
}

/// Renders one `[Interface]`/`[Peer]` WireGuard config block.
///
/// The private key is left as the `__PRIVATE_KEY__` placeholder: this
/// control plane never sees an agent's private key (§9), so substitution
/// happens on the agent after it generates or loads its own keypair.
pub fn generate(endpoint: &TunnelEndpoint) -> String {
    let mut out = format!(
        "[Interface]\nPrivateKey = __PRIVATE_KEY__\nAddress = {}\nListenPort = {}\n\n[Peer]\nPublicKey = {}\nAllowedIPs = {}\nPersistentKeepalive = {}\n",
        endpoint.internal_address,
        endpoint.listen_port,
        endpoint.peer_public_key,
        endpoint.peer_allowed_ips,
        PERSISTENT_KEEPALIVE_SECS,
    );
    if let Some(ref peer_endpoint) = endpoint.peer_endpoint {
        out.push_str(&format!("Endpoint = {peer_endpoint}\n"));
    }
    out
}

/// Renders a chain tunnel's per-segment configs joined by the
/// `---SPLIT---` sentinel, one block per hop-to-hop segment, in hop order.
pub fn generate_chain(segments: &[TunnelEndpoint]) -> String {
    segments
        .iter()
        .map(generate)
        .collect::<Vec<_>>()
        .join(CHAIN_SEGMENT_SEPARATOR)
}
