//! `IngestError`, grounded on the same closed-enum-over-exception-hierarchy
//! redesign note `codegraph_core::CoreError` follows.

use codegraph_core::CoreError;
use codegraph_embed::EmbeddingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] CoreError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("git error: {0}")]
    Git(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),
}

impl From<git2::Error> for IngestError {
    fn from(err: git2::Error) -> Self {
        IngestError::Git(err.to_string())
    }
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Io(err.to_string())
    }
}

pub type IngestResult<T> = Result<T, IngestError>;
