//! # Netly Orchestration Engine
//!
//! The allocation managers, protocol factory, bootstrap pipeline, tunnel
//! composer, and task registry that sit between `netly-server`'s HTTP
//! surface and `netly-db`'s persistence layer. Nothing here speaks HTTP or
//! SQL directly: every module takes repository trait objects and returns
//! [`error::CoreError`].

pub mod bootstrap;
pub mod cleanup;
pub mod composer;
pub mod config;
pub mod context;
pub mod crypto;
pub mod error;
pub mod fqdnam;
pub mod ipam;
pub mod locker;
pub mod portam;
pub mod protocol_factory;
pub mod ssh;
pub mod tasks;
pub mod timeline;

pub use bootstrap::Bootstrapper;
pub use cleanup::CleanupEngine;
pub use composer::Composer;
pub use config::Config;
pub use context::OpContext;
pub use crypto::{AuthCipher, AuthPlain};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use fqdnam::FqdnAllocator;
pub use ipam::{Ipam, Ipv4Allocation};
pub use locker::{KeyLocker, LockGuard};
pub use portam::Portam;
pub use tasks::{SharedTaskRegistry, Task, TaskRegistry, TaskStatus};
pub use timeline::Timeline;
