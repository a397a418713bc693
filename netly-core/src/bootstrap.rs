//! §4.8 Bootstrap pipeline — turns a freshly-registered node's SSH
//! credentials into a running `netly-agent`: connect, probe the distro,
//! install the WireGuard toolchain, open an anti-lockout firewall rule for
//! the SSH port *before* touching anything else network-facing, upload the
//! agent binary over SFTP, write its supervisor unit, and start it.

use std::path::Path;
use std::sync::Arc;

use netly_db::entities::timeline_event::{EventStatus, ResourceType};
use netly_db::repositories::NodeRepository;
use tracing::{info, warn};

use crate::context::OpContext;
use crate::crypto::AuthCipher;
use crate::error::{CoreError, CoreResult};
use crate::ssh::RemoteShell;
use crate::tasks::{SharedTaskRegistry, TaskStatus};
use crate::timeline::Timeline;

pub(crate) const AGENT_BINARY_PATH: &str = "/usr/local/bin/netly-agent";
pub(crate) const AGENT_UNIT_PATH: &str = "/etc/systemd/system/netly-agent.service";
pub(crate) const AGENT_CONFIG_DIR: &str = "/etc/netly-agent";
const AGENT_TMP_UPLOAD_PATH: &str = "/tmp/netly-agent";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Distro {
    Debian,
    Arch,
    RhelLike,
}

pub struct Bootstrapper {
    pub nodes: Arc<dyn NodeRepository>,
    pub cipher: AuthCipher,
    pub timeline: Timeline,
    pub tasks: SharedTaskRegistry,
    /// The `netly-agent` binary to ship to every node. Injected once at
    /// server startup, not re-read per install.
    pub agent_binary: Arc<Vec<u8>>,
    /// This control plane's own reachable URL, baked into the installed
    /// agent's supervisor unit as `NETLY_BACKEND_URL` so it knows where to
    /// heartbeat (§4.8 step 6).
    pub backend_url: String,
}

impl Bootstrapper {
    /// Runs the full install pipeline synchronously, updating node status
    /// and recording timeline events at every step.
    pub async fn install(&self, ctx: &OpContext, node_id: i64) -> CoreResult<()> {
        let node = self
            .nodes
            .get(node_id)
            .await
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::Conflict(format!("node {node_id} not found")))?;

        self.nodes
            .update_status(node_id, "installing", None)
            .await
            .map_err(CoreError::from)?;

        let result = self.run_pipeline(ctx, node_id, &node).await;

        match &result {
            Ok(()) => {
                self.nodes
                    .update_status(node_id, "online", None)
                    .await
                    .map_err(CoreError::from)?;
                self.timeline
                    .record(
                        ctx,
                        "node.install",
                        EventStatus::Success,
                        "agent installed and started",
                        ResourceType::Node,
                        node_id,
                        serde_json::json!({}),
                    )
                    .await;
            }
            Err(e) => {
                self.nodes
                    .update_status(node_id, "error", Some(e.to_string()))
                    .await
                    .map_err(CoreError::from)?;
                self.timeline
                    .record(
                        ctx,
                        "node.install",
                        EventStatus::Failed,
                        e.to_string(),
                        ResourceType::Node,
                        node_id,
                        serde_json::json!({}),
                    )
                    .await;
            }
        }

        result
    }

    /// Spawns [`Self::install`] on the runtime and returns the task tracking
    /// it immediately, for callers that don't want to hold an HTTP request
    /// open for the minutes a full install can take.
    pub fn install_async(self: Arc<Self>, ctx: OpContext, node_id: i64) -> String {
        let task = self
            .tasks
            .create_task("node.install", serde_json::json!({"node_id": node_id}));
        let task_id = task.id.clone();
        let tasks = self.tasks.clone();
        let this = self.clone();
        tokio::spawn(async move {
            match this.install(&ctx, node_id).await {
                Ok(()) => tasks.update_task(&task_id, TaskStatus::Succeeded),
                Err(e) => tasks.fail_task(&task_id, e.to_string()),
            }
        });
        task.id
    }

    async fn run_pipeline(
        &self,
        ctx: &OpContext,
        node_id: i64,
        node: &netly_db::entities::node::Model,
    ) -> CoreResult<()> {
        let auth = self
            .cipher
            .open(&node.auth_data)
            .map_err(|e| CoreError::Dependency(format!("failed to decrypt node credentials: {e}")))?;

        let mut shell = RemoteShell::new(node.endpoint_ip(), node.ssh_port as u16, auth);
        shell.connect_with_retry().await?;
        self.step(ctx, node_id, "ssh connected").await;

        let uname_a = shell.execute_with_retry("uname -a").await?.stdout;
        let arch = shell.execute_with_retry("uname -m").await?.stdout.trim().to_string();
        if arch != "x86_64" && arch != "amd64" {
            warn!(node_id, arch, "node architecture is not amd64, proceeding anyway");
        }
        self.step(ctx, node_id, &format!("probed system: {}", uname_a.trim())).await;

        let os_release = shell
            .execute_with_retry("cat /etc/os-release")
            .await?
            .stdout;
        let distro = detect_distro(&os_release)?;
        self.step(ctx, node_id, &format!("detected distro: {distro:?}")).await;

        let install_cmd = distro.install_wireguard_command();
        let install_out = shell.execute_with_retry(install_cmd).await?;
        if install_out.status_code != 0 {
            return Err(CoreError::Dependency(format!(
                "dependency install failed (exit {}): {}",
                install_out.status_code, install_out.stderr
            )));
        }
        self.step(ctx, node_id, "wireguard/iptables/curl toolchain installed").await;

        // Anti-lockout: make sure the SSH port this control plane used to
        // connect stays explicitly allowed before any tunnel-related
        // firewall rule is ever applied to this node.
        let lockout_cmd = distro.anti_lockout_command(node.ssh_port);
        shell.execute_with_retry(&lockout_cmd).await?;
        self.step(ctx, node_id, "anti-lockout firewall rule applied").await;

        // Upload to a world-writable staging path first, then move into
        // place with elevation: the SSH login user may not be root.
        shell
            .upload(Path::new(AGENT_TMP_UPLOAD_PATH), &self.agent_binary)
            .await?;
        let install_binary_out = shell
            .execute_with_retry(&format!(
                "sudo mv {AGENT_TMP_UPLOAD_PATH} {AGENT_BINARY_PATH} && sudo chmod +x {AGENT_BINARY_PATH}"
            ))
            .await?;
        if install_binary_out.status_code != 0 {
            return Err(CoreError::Dependency(format!(
                "failed to install agent binary (exit {}): {}",
                install_binary_out.status_code, install_binary_out.stderr
            )));
        }
        self.step(ctx, node_id, "agent binary uploaded").await;

        let unit = supervisor_unit(node_id, &self.backend_url);
        shell.upload(Path::new(AGENT_UNIT_PATH), unit.as_bytes()).await?;
        self.step(ctx, node_id, "supervisor unit written").await;

        let start_out = shell
            .execute_with_retry("systemctl daemon-reload && systemctl enable --now netly-agent")
            .await?;
        if start_out.status_code != 0 {
            return Err(CoreError::Dependency(format!(
                "failed to start netly-agent (exit {}): {}",
                start_out.status_code, start_out.stderr
            )));
        }

        shell.close().await?;
        Ok(())
    }

    async fn step(&self, ctx: &OpContext, node_id: i64, message: &str) {
        info!(node_id, message, "bootstrap step");
        self.timeline
            .record(
                ctx,
                "node.install.step",
                EventStatus::Pending,
                message.to_string(),
                ResourceType::Node,
                node_id,
                serde_json::json!({}),
            )
            .await;
    }
}

impl Distro {
    /// Installs `wireguard-tools iptables curl` — curl is needed by the
    /// agent itself for its control-plane calls, iptables by the
    /// anti-lockout step and later firewall rules.
    fn install_wireguard_command(&self) -> &'static str {
        match self {
            Distro::Debian => {
                "while fuser /var/lib/dpkg/lock-frontend /var/lib/dpkg/lock >/dev/null 2>&1; do sleep 1; done; \
                 DEBIAN_FRONTEND=noninteractive apt-get update -y && \
                 DEBIAN_FRONTEND=noninteractive apt-get install -y wireguard wireguard-tools iptables curl"
            }
            Distro::Arch => "pacman -Sy --noconfirm wireguard-tools iptables curl",
            Distro::RhelLike => {
                "dnf install -y wireguard-tools iptables curl || yum install -y wireguard-tools iptables curl"
            }
        }
    }

    fn anti_lockout_command(&self, ssh_port: i32) -> String {
        match self {
            Distro::Debian => format!(
                "command -v ufw >/dev/null 2>&1 && ufw allow {ssh_port}/tcp || iptables -I INPUT -p tcp --dport {ssh_port} -j ACCEPT"
            ),
            Distro::Arch => format!("iptables -I INPUT -p tcp --dport {ssh_port} -j ACCEPT || true"),
            Distro::RhelLike => format!(
                "firewall-cmd --permanent --add-port={ssh_port}/tcp && firewall-cmd --reload || iptables -I INPUT -p tcp --dport {ssh_port} -j ACCEPT"
            ),
        }
    }
}

fn detect_distro(os_release: &str) -> CoreResult<Distro> {
    let id_line = os_release
        .lines()
        .find(|l| l.starts_with("ID="))
        .ok_or_else(|| CoreError::Dependency("could not read ID from /etc/os-release".to_string()))?;
    let id = id_line.trim_start_matches("ID=").trim_matches('"').to_lowercase();
    match id.as_str() {
        "ubuntu" | "debian" => Ok(Distro::Debian),
        "arch" | "archlinux" | "manjaro" => Ok(Distro::Arch),
        "centos" | "rhel" | "fedora" | "rocky" | "almalinux" => Ok(Distro::RhelLike),
        other => {
            warn!(distro = other, "unrecognized distro, assuming debian-family");
            Ok(Distro::Debian)
        }
    }
}

fn supervisor_unit(node_id: i64, backend_url: &str) -> String {
    format!(
        "[Unit]\nDescription=Netly agent\nAfter=network-online.target\nWants=network-online.target\n\n\
         [Service]\nExecStart={AGENT_BINARY_PATH} start --node-id {node_id}\n\
         Environment=NETLY_BACKEND_URL={backend_url}\n\
         Environment=NETLY_NODE_TOKEN=node-token-{node_id}\n\
         Restart=always\nRestartSec=3\nUser=root\n\n[Install]\nWantedBy=multi-user.target\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_debian_family() {
        let os_release = "NAME=\"Ubuntu\"\nID=ubuntu\nVERSION_ID=\"22.04\"\n";
        assert_eq!(detect_distro(os_release).unwrap(), Distro::Debian);
    }

    #[test]
    fn detects_rhel_family() {
        let os_release = "NAME=\"Rocky Linux\"\nID=\"rocky\"\n";
        assert_eq!(detect_distro(os_release).unwrap(), Distro::RhelLike);
    }

    #[test]
    fn detects_arch() {
        let os_release = "NAME=\"Arch Linux\"\nID=arch\n";
        assert_eq!(detect_distro(os_release).unwrap(), Distro::Arch);
    }

    #[test]
    fn falls_back_to_debian_for_unknown_distro() {
        let os_release = "NAME=\"Mystery OS\"\nID=mystery\n";
        assert_eq!(detect_distro(os_release).unwrap(), Distro::Debian);
    }

    #[test]
    fn every_distro_installs_wireguard_iptables_and_curl() {
        for distro in [Distro::Debian, Distro::Arch, Distro::RhelLike] {
            let cmd = distro.install_wireguard_command();
            assert!(cmd.contains("wireguard-tools"), "{distro:?} missing wireguard-tools");
            assert!(cmd.contains("iptables"), "{distro:?} missing iptables");
            assert!(cmd.contains("curl"), "{distro:?} missing curl");
        }
    }

    #[test]
    fn supervisor_unit_references_start_subcommand_and_backend_env() {
        let unit = supervisor_unit(7, "https://netly.example.com");
        assert!(unit.contains("ExecStart=/usr/local/bin/netly-agent start --node-id 7"));
        assert!(unit.contains("Environment=NETLY_BACKEND_URL=https://netly.example.com"));
        assert!(unit.contains("Environment=NETLY_NODE_TOKEN=node-token-7"));
    }
}
