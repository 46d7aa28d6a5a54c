use thiserror::Error;

pub type ChatResult<T> = Result<T, ChatError>;

/// Errors reported by the storage collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat backend not configured: {0}")]
    NotConfigured(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("storage error: {0}")]
    Store(StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{failed_step} failed after {completed_step} completed: {source}")]
    PartialFailure {
        completed_step: &'static str,
        failed_step: &'static str,
        #[source]
        source: Box<ChatError>,
    },
}

impl From<StoreError> for ChatError {
    fn from(e: StoreError) -> Self {
        match e {
            // An uninitialized backend is its own category so callers can
            // show a setup message instead of a generic storage failure.
            StoreError::Unavailable(msg) => ChatError::NotConfigured(msg),
            other => ChatError::Store(other),
        }
    }
}
