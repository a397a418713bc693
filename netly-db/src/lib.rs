//! # Netly Durable Store
//!
//! `sea-orm` entities and repository traits for the durable tables in the
//! Netly control plane: nodes, tunnels, services, the timeline, and system
//! settings. Tasks and Commands are deliberately absent — those are
//! in-memory only and live in `netly-core::tasks`.

pub mod entities;
pub mod error;
pub mod repositories;

pub use error::{DbError, DbResult};
pub use sea_orm::DatabaseConnection;

/// Opens a connection pool against the configured DSN. Pool sizing is
/// read from `netly-core::config::DatabaseConfig`; this function takes
/// already-resolved values to keep `netly-db` free of a dependency on the
/// config crate.
pub async fn connect(
    dsn: &str,
    min_connections: u32,
    max_connections: u32,
) -> Result<DatabaseConnection, sea_orm::DbErr> {
    use sea_orm::ConnectOptions;
    let mut opts = ConnectOptions::new(dsn.to_owned());
    opts.min_connections(min_connections)
        .max_connections(max_connections);
    sea_orm::Database::connect(opts).await
}
