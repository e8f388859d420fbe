//! `AnalyzerError`, grounded on the same closed-enum-over-exception-hierarchy
//! redesign note `codegraph_core::CoreError` follows.

use codegraph_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("sandbox blocked: {0}")]
    SandboxBlocked(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("tracer subprocess error: {0}")]
    Subprocess(String),

    #[error("tracer subprocess timed out")]
    Timeout,

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for AnalyzerError {
    fn from(err: std::io::Error) -> Self {
        AnalyzerError::Io(err.to_string())
    }
}

impl From<AnalyzerError> for CoreError {
    fn from(err: AnalyzerError) -> Self {
        match err {
            AnalyzerError::InvalidRequest(msg) => CoreError::InvalidRequest(msg),
            AnalyzerError::SandboxBlocked(msg) => CoreError::SandboxBlocked(msg),
            AnalyzerError::Parse(msg) => CoreError::Parse(msg),
            AnalyzerError::Subprocess(msg) => CoreError::Internal(msg),
            AnalyzerError::Timeout => CoreError::Internal("analyzer subprocess timed out".to_string()),
            AnalyzerError::Io(msg) => CoreError::Internal(msg),
        }
    }
}

pub type AnalyzerResult<T> = Result<T, AnalyzerError>;
