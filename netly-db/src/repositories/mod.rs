pub mod allocation_repo;
pub mod node_repo;
pub mod service_repo;
pub mod setting_repo;
pub mod timeline_repo;
pub mod tunnel_repo;

pub use allocation_repo::{AllocationRepository, SeaOrmAllocationRepository};
pub use node_repo::{NewNode, NodeRepository, SeaOrmNodeRepository};
pub use service_repo::{NewService, SeaOrmServiceRepository, ServiceRepository};
pub use setting_repo::{SeaOrmSettingRepository, SettingRepository};
pub use timeline_repo::{NewTimelineEvent, SeaOrmTimelineRepository, TimelineRepository};
pub use tunnel_repo::{NewTunnel, SeaOrmTunnelRepository, TunnelRepository};
