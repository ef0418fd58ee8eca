use rusqlite::ErrorCode;
use thiserror::Error;

/// Failures of the remote record store.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("transaction gave up after {attempts} attempts under contention")]
    TransactionConflict { attempts: u32 },
    #[error("invalid document path or field: {0}")]
    InvalidPath(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl RemoteError {
    /// Whether the underlying SQLite error is a lock conflict worth retrying.
    pub fn is_busy(&self) -> bool {
        let Self::Backend(err) = self else {
            return false;
        };
        matches!(
            err.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(code, _))
                if matches!(code.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        )
    }
}

impl From<rusqlite::Error> for RemoteError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Backend(anyhow::Error::new(err))
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        Self::Backend(anyhow::Error::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_errors_are_recognized() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(RemoteError::from(busy).is_busy());
        assert!(!RemoteError::NotFound("users/x".into()).is_busy());
        assert!(!RemoteError::from(rusqlite::Error::QueryReturnedNoRows).is_busy());
    }
}
