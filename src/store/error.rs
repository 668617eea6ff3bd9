//! Store error types.

/// Error raised by an account store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Transport failure talking to a remote store.
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote store answered with a non-success status.
    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Stored document could not be decoded.
    #[error("invalid document: {0}")]
    Decode(String),

    /// Local database failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem failure preparing a local store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend selected but missing required settings.
    #[error("store not configured: {0}")]
    Unconfigured(String),

    /// Blocking database task panicked or was cancelled.
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StoreError {
    /// Create a decode error from any displayable value.
    #[inline]
    pub fn decode<E: std::fmt::Display>(err: E) -> Self {
        Self::Decode(err.to_string())
    }

    /// Whether the backend itself is unreachable or unusable, as opposed to
    /// one record being unreadable.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Decode(_) => false,
            Self::Sqlite(e) => !matches!(
                e,
                rusqlite::Error::FromSqlConversionFailure(..)
                    | rusqlite::Error::IntegralValueOutOfRange(..)
                    | rusqlite::Error::InvalidColumnType(..)
            ),
            Self::Http(_) | Self::Status { .. } | Self::Io(_) | Self::Unconfigured(_) | Self::Task(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::types::Type;

    #[test]
    fn test_record_errors_are_not_outages() {
        assert!(!StoreError::decode("usage_count is not an integer").is_unavailable());
        assert!(!StoreError::Sqlite(rusqlite::Error::InvalidColumnType(
            0,
            "usage_count".to_string(),
            Type::Text
        ))
        .is_unavailable());
    }

    #[test]
    fn test_backend_errors_are_outages() {
        assert!(StoreError::Status { status: 503, body: String::new() }.is_unavailable());
        assert!(StoreError::Unconfigured("no project".to_string()).is_unavailable());
        assert!(StoreError::Io(std::io::Error::other("disk gone")).is_unavailable());
        assert!(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows).is_unavailable());
    }
}
