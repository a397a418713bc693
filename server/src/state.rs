//! # Server State
//!
//! Holds the shared application state for the control plane: repository
//! handles, the orchestration engines from `netly-core`, and the
//! in-memory task/command registry. Generalizes the teacher's
//! `Arc<DashMap<...>>` registry split (`agents`/`connections`/`sessions`)
//! into one `AppState` wrapping `netly-core`'s own `Arc`-based engines,
//! since those already own their concurrency story.

use std::sync::Arc;

use netly_core::{
    AuthCipher, Bootstrapper, CleanupEngine, Composer, Config, FqdnAllocator, Ipam, KeyLocker,
    Portam, SharedTaskRegistry, TaskRegistry, Timeline,
};
use netly_db::repositories::{
    AllocationRepository, NodeRepository, SeaOrmAllocationRepository, SeaOrmNodeRepository,
    SeaOrmServiceRepository, SeaOrmSettingRepository, SeaOrmTimelineRepository,
    SeaOrmTunnelRepository, ServiceRepository, SettingRepository, TimelineRepository,
    TunnelRepository,
};
use netly_db::DatabaseConnection;

/// Shared application state, cloned (cheaply — every field is an `Arc`)
/// and passed to each request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub nodes: Arc<dyn NodeRepository>,
    pub tunnels: Arc<dyn TunnelRepository>,
    pub services: Arc<dyn ServiceRepository>,
    pub settings: Arc<dyn SettingRepository>,
    pub allocations: Arc<dyn AllocationRepository>,
    pub timeline: Arc<dyn TimelineRepository>,
    pub tasks: SharedTaskRegistry,
    pub composer: Arc<Composer>,
    pub bootstrapper: Arc<Bootstrapper>,
    pub cleanup: Arc<CleanupEngine>,
    pub fqdn: Arc<FqdnAllocator>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config, agent_binary: Vec<u8>) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let nodes: Arc<dyn NodeRepository> = Arc::new(SeaOrmNodeRepository::new(db.clone()));
        let tunnels: Arc<dyn TunnelRepository> = Arc::new(SeaOrmTunnelRepository::new(db.clone()));
        let services: Arc<dyn ServiceRepository> = Arc::new(SeaOrmServiceRepository::new(db.clone()));
        let settings: Arc<dyn SettingRepository> = Arc::new(SeaOrmSettingRepository::new(db.clone()));
        let allocations: Arc<dyn AllocationRepository> =
            Arc::new(SeaOrmAllocationRepository::new(db.clone()));
        let timeline_repo: Arc<dyn TimelineRepository> =
            Arc::new(SeaOrmTimelineRepository::new(db.clone()));

        let timeline = Timeline::new(timeline_repo.clone());
        let tasks: SharedTaskRegistry = Arc::new(TaskRegistry::new());
        let locker = KeyLocker::new();
        let ipam = Ipam::new(&config.ipam.ipv4_cidr)?;
        let portam = Portam::new(config.portam.min_port, config.portam.max_port)?;
        let cipher = AuthCipher::from_hex_key(&config.security.encryption_key)?;
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
            agent_binary: Arc::new(agent_binary),
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

        Ok(Self {
            config,
            nodes,
            tunnels,
            services,
            settings,
            allocations,
            timeline: timeline_repo,
            tasks,
            composer,
            bootstrapper,
            cleanup,
            fqdn,
        })
    }
}
