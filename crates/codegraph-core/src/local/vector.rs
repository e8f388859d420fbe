//! Local, file-backed `VectorStore` reference implementation.
//!
//! Brute-force cosine search over in-memory vectors, generalized from
//! `rpg-nav::embedding_search::search_by_embedding` to per-project
//! collections, persisted the same rename-on-write way as the graph store.

use crate::error::{CoreError, CoreResult};
use crate::vector_store::{cosine_similarity, SimilarityHit, VectorEntry, VectorMetadata, VectorStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Collection {
    entries: Vec<VectorEntry>,
}

pub struct LocalVectorStore {
    dir: PathBuf,
    dimension: usize,
    cache: Arc<RwLock<HashMap<String, Collection>>>,
}

impl LocalVectorStore {
    pub fn new(data_dir: impl AsRef<Path>, dimension: usize) -> Self {
        Self {
            dir: data_dir.as_ref().join("vectors"),
            dimension,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn path_for(&self, project_id: &str) -> PathBuf {
        self.dir.join(format!("{project_id}.json"))
    }

    async fn load(&self, project_id: &str) -> CoreResult<Collection> {
        if let Some(c) = self.cache.read().await.get(project_id) {
            return Ok(c.clone());
        }
        let path = self.path_for(project_id);
        if !path.exists() {
            return Ok(Collection::default());
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| CoreError::Internal(format!("reading {}: {e}", path.display())))?;
        let collection: Collection = serde_json::from_str(&raw)
            .map_err(|e| CoreError::Internal(format!("parsing {}: {e}", path.display())))?;
        self.cache.write().await.insert(project_id.to_string(), collection.clone());
        Ok(collection)
    }

    async fn commit(&self, project_id: &str, collection: Collection) -> CoreResult<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| CoreError::Internal(format!("creating vector dir: {e}")))?;
        let path = self.path_for(project_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&collection)
            .map_err(|e| CoreError::Internal(format!("serializing collection: {e}")))?;
        std::fs::write(&tmp, json).map_err(|e| CoreError::Internal(format!("writing {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &path).map_err(|e| CoreError::Internal(format!("renaming {}: {e}", tmp.display())))?;
        self.cache.write().await.insert(project_id.to_string(), collection);
        Ok(())
    }

    fn validate_dimension(&self, vector: &[f32]) -> CoreResult<()> {
        if vector.len() != self.dimension {
            return Err(CoreError::InvalidRequest(format!(
                "expected {}-dimensional vector, got {}",
                self.dimension,
                vector.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn ensure_collection(&self, project_id: &str) -> CoreResult<()> {
        if self.path_for(project_id).exists() || self.cache.read().await.contains_key(project_id) {
            return Ok(());
        }
        self.commit(project_id, Collection::default()).await
    }

    async fn store_embedding(
        &self,
        entity_id: &str,
        vector: Vec<f32>,
        metadata: VectorMetadata,
    ) -> CoreResult<()> {
        self.validate_dimension(&vector)?;
        let project_id = metadata.project_id.clone();
        let mut collection = self.load(&project_id).await?;
        collection.entries.retain(|e| e.entity_id != entity_id);
        collection.entries.push(VectorEntry {
            entity_id: entity_id.to_string(),
            vector,
            metadata,
        });
        self.commit(&project_id, collection).await
    }

    async fn batch_store(&self, entries: Vec<VectorEntry>) -> CoreResult<()> {
        for entry in &entries {
            self.validate_dimension(&entry.vector)?;
        }
        let mut by_project: HashMap<String, Vec<VectorEntry>> = HashMap::new();
        for entry in entries {
            by_project.entry(entry.metadata.project_id.clone()).or_default().push(entry);
        }
        for (project_id, new_entries) in by_project {
            let mut collection = self.load(&project_id).await?;
            for entry in new_entries {
                collection.entries.retain(|e| e.entity_id != entry.entity_id);
                collection.entries.push(entry);
            }
            self.commit(&project_id, collection).await?;
        }
        Ok(())
    }

    async fn semantic_search(
        &self,
        query_vector: &[f32],
        project_ids: &[String],
        top_k: usize,
        similarity_threshold: f32,
    ) -> CoreResult<Vec<SimilarityHit>> {
        self.validate_dimension(query_vector)?;
        let mut hits = Vec::new();
        for project_id in project_ids {
            let collection = self.load(project_id).await?;
            for entry in &collection.entries {
                let similarity = cosine_similarity(query_vector, &entry.vector);
                if similarity >= similarity_threshold {
                    hits.push(SimilarityHit {
                        entity_id: entry.entity_id.clone(),
                        similarity,
                        metadata: entry.metadata.clone(),
                    });
                }
            }
        }
        hits.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn find_similar(
        &self,
        entity_id: &str,
        project_id: &str,
        top_k: usize,
    ) -> CoreResult<Vec<SimilarityHit>> {
        let collection = self.load(project_id).await?;
        let Some(target) = collection.entries.iter().find(|e| e.entity_id == entity_id) else {
            return Ok(Vec::new());
        };
        let query = target.vector.clone();
        let mut hits = self
            .semantic_search(&query, std::slice::from_ref(&project_id.to_string()), top_k + 1, f32::MIN)
            .await?;
        hits.retain(|h| h.entity_id != entity_id);
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete_project(&self, project_id: &str) -> CoreResult<usize> {
        let collection = self.load(project_id).await?;
        let count = collection.entries.len();
        self.cache.write().await.remove(project_id);
        let path = self.path_for(project_id);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| CoreError::Internal(format!("deleting {}: {e}", path.display())))?;
        }
        Ok(count)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(project_id: &str, name: &str) -> VectorMetadata {
        VectorMetadata {
            kind: "function".to_string(),
            file_path: "m.py".to_string(),
            name: name.to_string(),
            project_id: project_id.to_string(),
        }
    }

    #[tokio::test]
    async fn store_and_search_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::new(dir.path(), 3);
        store
            .store_embedding("e1", vec![1.0, 0.0, 0.0], meta("P", "add"))
            .await
            .unwrap();
        store
            .store_embedding("e2", vec![0.0, 1.0, 0.0], meta("P", "sub"))
            .await
            .unwrap();

        let hits = store
            .semantic_search(&[1.0, 0.0, 0.0], &["P".to_string()], 10, 0.0)
            .await
            .unwrap();
        assert_eq!(hits[0].entity_id, "e1");
    }

    #[tokio::test]
    async fn wrong_dimension_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::new(dir.path(), 3);
        let result = store.store_embedding("e1", vec![1.0, 0.0], meta("P", "add")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn find_similar_excludes_self() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::new(dir.path(), 2);
        store.store_embedding("e1", vec![1.0, 0.0], meta("P", "a")).await.unwrap();
        store.store_embedding("e2", vec![0.9, 0.1], meta("P", "b")).await.unwrap();
        let hits = store.find_similar("e1", "P", 5).await.unwrap();
        assert!(hits.iter().all(|h| h.entity_id != "e1"));
        assert_eq!(hits[0].entity_id, "e2");
    }

    #[tokio::test]
    async fn delete_project_is_noop_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::new(dir.path(), 2);
        let count = store.delete_project("missing").await.unwrap();
        assert_eq!(count, 0);
    }
}
