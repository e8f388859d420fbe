//! `EmbeddingError`, grounded on `rpg_lift::provider::ProviderError`'s shape
//! for a typed adapter error (§7 "closed enums over exception hierarchies").

use codegraph_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding input was empty")]
    EmptyInput,

    #[error("embedding returned dimension {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("failed to initialize embedding model: {0}")]
    ModelInit(String),

    #[error("embedding generation failed: {0}")]
    Generation(String),

    #[error("invalid embedding configuration: {0}")]
    Configuration(String),

    #[error("embedding request was cancelled")]
    Cancelled,
}

impl From<EmbeddingError> for CoreError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::EmptyInput | EmbeddingError::DimensionMismatch { .. } | EmbeddingError::Configuration(_) => {
                CoreError::InvalidRequest(err.to_string())
            }
            EmbeddingError::ModelInit(_) | EmbeddingError::Generation(_) => CoreError::EmbeddingGeneration(err.to_string()),
            EmbeddingError::Cancelled => CoreError::Internal(err.to_string()),
        }
    }
}
