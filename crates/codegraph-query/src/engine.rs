//! `QueryEngine` (§4.7): cached structural traversals, semantic search, and
//! the graph-visualization projection. Every read consults `QueryCache`
//! first; writes the caller routes elsewhere (the Coordinator's
//! `GraphStore` calls) are expected to call `invalidate_project` after.

use crate::cache::QueryCache;
use crate::keys;
use codegraph_core::config::QueryConfig;
use codegraph_core::graph_store::{GraphFilters, ImpactResult, VisualizationResult};
use codegraph_core::{CoreError, CoreResult, Entity, GraphStore, VectorStore};
use codegraph_embed::{EmbeddingClient, EmbeddingTask};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QueryResult {
    pub entities: Vec<Entity>,
    pub count: usize,
    pub duration_ms: u64,
    pub fingerprint: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchHit {
    pub entity_id: String,
    pub similarity: f32,
    pub snippet: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchResult {
    pub results: Vec<SearchHit>,
    pub count: usize,
}

pub struct QueryEngine {
    graph_store: Arc<dyn GraphStore>,
    vector_store: Arc<dyn VectorStore>,
    embedding_client: Arc<EmbeddingClient>,
    cache: QueryCache,
    config: QueryConfig,
}

impl QueryEngine {
    pub fn new(
        graph_store: Arc<dyn GraphStore>,
        vector_store: Arc<dyn VectorStore>,
        embedding_client: Arc<EmbeddingClient>,
        config: QueryConfig,
    ) -> Self {
        let cache = QueryCache::new(config.cache_ttl_seconds);
        Self { graph_store, vector_store, embedding_client, cache, config }
    }

    pub async fn find_callers(&self, entity_id: &str, project_id: &str) -> CoreResult<QueryResult> {
        let key = keys::callers_key(project_id, entity_id);
        if let Some(cached) = self.cached_result(&key).await {
            return Ok(cached);
        }
        let started = Instant::now();
        let entities = self.graph_store.find_callers(entity_id, project_id).await?;
        let result = QueryResult {
            count: entities.len(),
            entities,
            duration_ms: started.elapsed().as_millis() as u64,
            fingerprint: key.clone(),
        };
        self.store_result(&key, &result).await;
        Ok(result)
    }

    pub async fn find_dependencies(&self, entity_id: &str, project_id: &str) -> CoreResult<QueryResult> {
        let key = keys::dependencies_key(project_id, entity_id);
        if let Some(cached) = self.cached_result(&key).await {
            return Ok(cached);
        }
        let started = Instant::now();
        let entities = self.graph_store.find_dependencies(entity_id, project_id).await?;
        let result = QueryResult {
            count: entities.len(),
            entities,
            duration_ms: started.elapsed().as_millis() as u64,
            fingerprint: key.clone(),
        };
        self.store_result(&key, &result).await;
        Ok(result)
    }

    pub async fn impact_analysis(&self, entity_id: &str, project_id: &str, max_depth: usize) -> CoreResult<ImpactResult> {
        let key = keys::impact_key(project_id, entity_id, max_depth);
        if let Some(cached) = self.cache.get(&key).await {
            if let Ok(result) = serde_json::from_value(cached) {
                return Ok(result);
            }
        }
        let result = self.graph_store.impact_analysis(entity_id, project_id, max_depth).await?;
        self.cache.set(key, serde_json::to_value(&result).unwrap_or(serde_json::Value::Null)).await;
        Ok(result)
    }

    /// Computes a query embedding, delegates to the vector store, then
    /// materializes the full entity for every hit and builds a snippet
    /// (signature preferred, then body, truncated to 200 chars).
    pub async fn semantic_search(&self, query: &str, project_ids: &[String], top_k: usize) -> CoreResult<SearchResult> {
        let key = keys::search_key(project_ids, query, top_k);
        if let Some(cached) = self.cache.get(&key).await {
            if let Ok(result) = serde_json::from_value(cached) {
                return Ok(result);
            }
        }

        let vector = self
            .embedding_client
            .generate(query, EmbeddingTask::Query, true)
            .await
            .map_err(CoreError::from)?;

        let hits = self
            .vector_store
            .semantic_search(&vector, project_ids, top_k, self.config.default_similarity_threshold)
            .await?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(entity) = self.graph_store.get_entity(&hit.entity_id, &hit.metadata.project_id).await? else {
                continue;
            };
            results.push(SearchHit { entity_id: hit.entity_id, similarity: hit.similarity, snippet: snippet_for(&entity) });
        }
        results.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);

        let result = SearchResult { count: results.len(), results };
        self.cache.set(key, serde_json::to_value(&result).unwrap_or(serde_json::Value::Null)).await;
        Ok(result)
    }

    pub async fn get_project_graph(&self, project_id: &str, filters: &GraphFilters) -> CoreResult<VisualizationResult> {
        let fingerprint = format!("{filters:?}");
        let key = keys::graph_key(project_id, &fingerprint);
        if let Some(cached) = self.cache.get(&key).await {
            if let Ok(result) = serde_json::from_value(cached) {
                return Ok(result);
            }
        }
        let result = self.graph_store.get_project_graph(project_id, filters).await?;
        self.cache.set(key, serde_json::to_value(&result).unwrap_or(serde_json::Value::Null)).await;
        Ok(result)
    }

    /// Best-effort invalidation on any write to `project_id` (§4.7).
    pub async fn invalidate_project(&self, project_id: &str) -> usize {
        self.cache.invalidate_project(project_id).await
    }

    async fn cached_result(&self, key: &str) -> Option<QueryResult> {
        let value = self.cache.get(key).await?;
        serde_json::from_value(value).ok()
    }

    async fn store_result(&self, key: &str, result: &QueryResult) {
        if let Ok(value) = serde_json::to_value(result) {
            self.cache.set(key.to_string(), value).await;
        }
    }
}

fn snippet_for(entity: &Entity) -> String {
    let source = entity
        .signature
        .clone()
        .or_else(|| entity.body.clone())
        .unwrap_or_else(|| format!("{}: {}", entity.kind, entity.name));
    truncate_with_ellipsis(&source, 200)
}

fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut truncated: String = text.chars().take(max_chars).collect();
        truncated.push('\u{2026}');
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_prefers_signature_then_body_then_fallback() {
        let mut entity = Entity {
            id: "id".to_string(),
            project_id: "P".to_string(),
            kind: codegraph_core::EntityKind::Function,
            name: "add".to_string(),
            file_path: "m.py".to_string(),
            start_line: 1,
            end_line: 2,
            language: codegraph_core::Language::Python,
            signature: Some("def add(a, b):".to_string()),
            docstring: None,
            body: Some("return a + b".to_string()),
            metadata: Default::default(),
        };
        assert_eq!(snippet_for(&entity), "def add(a, b):");

        entity.signature = None;
        assert_eq!(snippet_for(&entity), "return a + b");

        entity.body = None;
        assert_eq!(snippet_for(&entity), "function: add");
    }

    #[test]
    fn truncation_adds_ellipsis_past_the_char_cap() {
        let long = "x".repeat(250);
        let snippet = truncate_with_ellipsis(&long, 200);
        assert_eq!(snippet.chars().count(), 201);
        assert!(snippet.ends_with('\u{2026}'));
    }
}
