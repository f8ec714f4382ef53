use std::error::Error;

use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Backend-agnostic failure of a durable store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or answered unexpectedly.
    #[error("{backend} unavailable: {source}")]
    Unavailable {
        backend: &'static str,
        source: Box<dyn Error + Send + Sync>,
    },
    /// The addressed record does not exist.
    #[error("{0} not found in storage")]
    NotFound(String),
    /// The payload was refused before reaching the backend.
    #[error("rejected by storage: {0}")]
    Rejected(String),
}

impl StorageError {
    /// Wrap an adapter failure of `backend`.
    pub fn unavailable(backend: &'static str, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            backend,
            source: Box::new(source),
        }
    }

    /// Rating batch carrying a zero question or candidate id.
    pub fn invalid_rating_target() -> Self {
        StorageError::Rejected("question and candidate identifiers must be positive".into())
    }
}
