use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The embedding function or index backend failed; no index state was changed.
    #[error("Retrieval failed: {cause}")]
    RetrievalFailed { cause: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

impl Error {
    pub fn retrieval(cause: impl std::fmt::Display) -> Self {
        Self::RetrievalFailed { cause: cause.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
