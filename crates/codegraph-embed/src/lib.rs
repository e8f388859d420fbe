//! Rate-limited embedding client over a local fastembed model (§4.5).

pub mod client;
pub mod error;
pub mod format;
pub mod model;
pub mod rate_limit;

pub use client::{EmbeddingClient, EmbeddingTask};
pub use error::EmbeddingError;
