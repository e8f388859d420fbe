//! Cached structural/semantic queries and hybrid retrieval (§4.7-§4.8).

pub mod cache;
pub mod context;
pub mod engine;
pub mod keys;

pub use context::{ContextAssembler, ContextResult, MatchSource, ScoredEntity, ValidationResult};
pub use engine::{QueryEngine, QueryResult, SearchHit, SearchResult};
