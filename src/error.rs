//! Error types for joinq.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("work item not found: {0}")]
    NotFound(String),

    /// The item is already terminal (or otherwise not in the source state).
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Contention on a single row (bad id or terminal state). Never fatal
    /// to the processing loop.
    pub fn is_contention(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::InvalidTransition { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
