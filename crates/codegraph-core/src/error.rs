//! The closed error taxonomy (§7): one variant per recovery-owning kind.
//!
//! Mirrors the exception hierarchy in the original `utils/errors.py`
//! (`GraphRAGException` and its subclasses), translated into a flat tagged
//! enum per the "closed enums over exception hierarchies" redesign note.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    #[error("database query error: {0}")]
    DatabaseQuery(String),

    #[error("database query timed out: {0}")]
    DatabaseQueryTimeout(String),

    #[error("embedding generation failed: {0}")]
    EmbeddingGeneration(String),

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("file size exceeded: {0}")]
    FileSizeExceeded(String),

    #[error("sandbox blocked: {0}")]
    SandboxBlocked(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether a retry policy should re-attempt the operation that raised
    /// this error. Only transient/unavailable kinds are retryable; syntax
    /// and constraint-violation errors fail immediately (§4.3).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::DatabaseConnection(_) | CoreError::DatabaseQueryTimeout(_)
        )
    }

    /// The error code used in the HTTP error body contract (§6), even
    /// though no HTTP layer lives in this crate.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::Parse(_) => "PARSE_ERROR",
            CoreError::DatabaseConnection(_) => "DB_CONNECTION_ERROR",
            CoreError::DatabaseQuery(_) => "DB_QUERY_ERROR",
            CoreError::DatabaseQueryTimeout(_) => "DB_QUERY_TIMEOUT",
            CoreError::EmbeddingGeneration(_) => "EMBEDDING_GENERATION_ERROR",
            CoreError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            CoreError::InvalidRequest(_) => "INVALID_REQUEST",
            CoreError::ProjectNotFound(_) => "PROJECT_NOT_FOUND",
            CoreError::EntityNotFound(_) => "ENTITY_NOT_FOUND",
            CoreError::FileSizeExceeded(_) => "FILE_SIZE_EXCEEDED",
            CoreError::SandboxBlocked(_) => "SANDBOX_BLOCKED",
            CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status a future transport would map this to (§6).
    pub fn status_hint(&self) -> u16 {
        match self {
            CoreError::Parse(_) | CoreError::InvalidRequest(_) => 400,
            CoreError::DatabaseConnection(_) => 503,
            CoreError::DatabaseQuery(_) => 500,
            CoreError::DatabaseQueryTimeout(_) => 504,
            CoreError::RateLimitExceeded => 429,
            CoreError::ProjectNotFound(_) | CoreError::EntityNotFound(_) => 404,
            CoreError::FileSizeExceeded(_) => 413,
            CoreError::SandboxBlocked(_) => 403,
            CoreError::EmbeddingGeneration(_) | CoreError::Internal(_) => 500,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds_are_limited() {
        assert!(CoreError::DatabaseConnection("x".into()).is_retryable());
        assert!(CoreError::DatabaseQueryTimeout("x".into()).is_retryable());
        assert!(!CoreError::DatabaseQuery("x".into()).is_retryable());
        assert!(!CoreError::Parse("x".into()).is_retryable());
    }

    #[test]
    fn status_hints_match_contract() {
        assert_eq!(CoreError::RateLimitExceeded.status_hint(), 429);
        assert_eq!(CoreError::ProjectNotFound("p".into()).status_hint(), 404);
        assert_eq!(CoreError::FileSizeExceeded("f".into()).status_hint(), 413);
        assert_eq!(CoreError::SandboxBlocked("x".into()).status_hint(), 403);
    }
}
