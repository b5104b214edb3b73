//! Failure taxonomy shared by the memory pipeline and the HTTP surface.
//!
//! Every variant except [`MemoryError::Internal`] is an expected outcome that
//! callers branch on; `Internal` wraps infrastructure failures (SQLite, ONNX
//! Runtime, I/O) carried as [`anyhow::Error`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    /// No recognized export layout exists at the source.
    #[error("no conversation export found: {0}")]
    NotFound(String),

    /// A single conversation entry could not be parsed. Skipped by the extractor.
    #[error("malformed conversation data: {0}")]
    Malformed(String),

    /// Empty query, empty message list, or similar caller error.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The memory table does not exist yet.
    #[error("memory not ready: {0}")]
    NotReady(String),

    /// Request carried a missing or incorrect secret.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The shared secret was never configured.
    #[error("server misconfigured: {0}")]
    Misconfigured(String),

    /// Retrieval is disabled for this process.
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for MemoryError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Internal(e.into())
    }
}

pub type MemoryResult<T> = std::result::Result<T, MemoryError>;
