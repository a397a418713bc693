use thiserror::Error;

/// §7 error kinds that originate at the persistence layer. `Conflict` is
/// raised when a composite uniqueness constraint (`(node_id, port,
/// protocol)`, `(node_id, ip_address)`) would be violated; everything else
/// from the driver is wrapped as `Backend`.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database backend error: {0}")]
    Backend(#[from] sea_orm::DbErr),
}

pub type DbResult<T> = Result<T, DbError>;
