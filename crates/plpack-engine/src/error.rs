//! Engine error taxonomy.

use thiserror::Error;

use plpack_media::MediaError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced across the engine façade.
///
/// Per-item fetch failures are deliberately absent: they are recorded in
/// the item's state and never cross the worker boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Caller queried a job that does not exist (or was evicted)
    #[error("Job not found")]
    NotFound,

    /// Caller asked for the archive of a job that is not `Finished`
    #[error("Archive not ready")]
    NotReady,

    /// Bad input at job creation; surfaced immediately, never retried
    #[error("Validation error: {0}")]
    Validation(String),

    /// Archive assembly failed; surfaced as job `Error` even when items
    /// succeeded, since the deliverable cannot be produced
    #[error("Packaging failed: {message}")]
    Packaging { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),
}

impl EngineError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a packaging error.
    pub fn packaging(message: impl Into<String>) -> Self {
        Self::Packaging {
            message: message.into(),
        }
    }
}
