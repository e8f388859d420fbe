//! Reference GraphStore/VectorStore adapters backed by local JSON files.
//!
//! Exercises the rest of the system without a live property-graph or
//! vector database, the same precedent the teacher repo sets by persisting
//! its graph to `.rpg/graph.json` instead of linking a database client
//! (`rpg-core::storage`).

pub mod graph;
pub mod vector;

pub use graph::LocalGraphStore;
pub use vector::LocalVectorStore;
