//! VectorStore adapter surface (§4.4).
//!
//! Per-project collections named `project_<project_id>_embeddings`. The
//! reference adapter in `codegraph_core::local::vector` does brute-force
//! cosine search over in-memory vectors, the same approach
//! `rpg-nav::embedding_search` takes — a real deployment backs this trait
//! with a dedicated vector database.

use crate::error::CoreResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub fn collection_name(project_id: &str) -> String {
    format!("project_{project_id}_embeddings")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMetadata {
    pub kind: String,
    pub file_path: String,
    pub name: String,
    pub project_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    pub entity_id: String,
    pub vector: Vec<f32>,
    pub metadata: VectorMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityHit {
    pub entity_id: String,
    pub similarity: f32,
    pub metadata: VectorMetadata,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn ensure_collection(&self, project_id: &str) -> CoreResult<()>;

    async fn store_embedding(
        &self,
        entity_id: &str,
        vector: Vec<f32>,
        metadata: VectorMetadata,
    ) -> CoreResult<()>;

    /// Groups entries by project_id and performs one collection-level
    /// upsert per project.
    async fn batch_store(&self, entries: Vec<VectorEntry>) -> CoreResult<()>;

    async fn semantic_search(
        &self,
        query_vector: &[f32],
        project_ids: &[String],
        top_k: usize,
        similarity_threshold: f32,
    ) -> CoreResult<Vec<SimilarityHit>>;

    /// Excludes the entity itself from the results.
    async fn find_similar(
        &self,
        entity_id: &str,
        project_id: &str,
        top_k: usize,
    ) -> CoreResult<Vec<SimilarityHit>>;

    /// Deletes the whole collection; non-existence is a no-op returning 0.
    async fn delete_project(&self, project_id: &str) -> CoreResult<usize>;

    fn dimension(&self) -> usize;
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

pub type MetadataMap = BTreeMap<String, serde_json::Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn collection_name_is_scoped_to_project() {
        assert_eq!(collection_name("P"), "project_P_embeddings");
    }
}
