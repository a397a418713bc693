//! §7 error kinds.

use thiserror::Error;

/// The error kinds enumerated in §7. `kind()` lets an HTTP layer (out of
/// scope here) map any `CoreError` to a status code without matching on
/// the full variant list.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("resource exhausted: {0}")]
    Exhausted(String),

    #[error("remote node error: {0}")]
    Remote(String),

    #[error("dependency failed: {0}")]
    Dependency(String),

    #[error("internal panic recovered: {0}")]
    Panic(String),

    #[error(transparent)]
    Db(#[from] netly_db::DbError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Exhausted,
    Remote,
    Dependency,
    Panic,
    Db,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::Conflict(_) => ErrorKind::Conflict,
            CoreError::Exhausted(_) => ErrorKind::Exhausted,
            CoreError::Remote(_) => ErrorKind::Remote,
            CoreError::Dependency(_) => ErrorKind::Dependency,
            CoreError::Panic(_) => ErrorKind::Panic,
            CoreError::Db(_) => ErrorKind::Db,
        }
    }

    pub fn same_node() -> Self {
        CoreError::Validation("source and destination node must differ".to_string())
    }

    pub fn range_exhausted() -> Self {
        CoreError::Exhausted("RANGE_EXHAUSTED".to_string())
    }

    pub fn no_ports() -> Self {
        CoreError::Exhausted("NO_PORTS".to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_report_the_expected_kind() {
        assert_eq!(CoreError::same_node().kind(), ErrorKind::Validation);
        assert_eq!(CoreError::range_exhausted().kind(), ErrorKind::Exhausted);
        assert_eq!(CoreError::no_ports().kind(), ErrorKind::Exhausted);
    }
}
