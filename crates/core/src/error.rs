//! Error types for the voting core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl Error {
    /// Store-level failures are logged with detail and surfaced to callers
    /// as an opaque "did not succeed"; the structured variants are safe to
    /// show as-is.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Persistence(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
