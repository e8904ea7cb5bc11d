use thiserror::Error;

/// Errors produced by the counter core.
#[derive(Debug, Error)]
pub enum CounterError {
    /// The durable store couldn't be read or written. The operation had no effect.
    #[error("counter storage unavailable: {0}")]
    StorageUnavailable(#[source] StorageFault),
}

#[derive(Debug, Error)]
pub enum StorageFault {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
    #[error("corrupted row: {0}")]
    Corrupt(String),
}

impl From<rusqlite::Error> for CounterError {
    fn from(value: rusqlite::Error) -> Self {
        Self::StorageUnavailable(value.into())
    }
}

impl From<std::io::Error> for CounterError {
    fn from(value: std::io::Error) -> Self {
        Self::StorageUnavailable(value.into())
    }
}

impl From<tokio::task::JoinError> for CounterError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::StorageUnavailable(value.into())
    }
}

/// Failure to persist the cache file. Never returned to callers, only logged.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to write cache file: {0}")]
    WriteFailed(#[from] std::io::Error),
    #[error("failed to encode cache file: {0}")]
    Encode(#[from] serde_json::Error),
}
