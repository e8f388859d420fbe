//! Data model, error taxonomy, configuration, and store adapters shared by
//! every other crate in the code-intelligence core.

pub mod config;
pub mod error;
pub mod graph_store;
pub mod id;
pub mod local;
pub mod model;
pub mod retry;
pub mod session_store;
pub mod vector_store;

pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use graph_store::GraphStore;
pub use model::{Entity, EntityKind, Language, Project, Relationship, RelationshipKind, Session};
pub use vector_store::VectorStore;
