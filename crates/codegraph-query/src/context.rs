//! `ContextAssembler` (§4.8): hybrid ranking fusion and token-budgeted
//! prompt context assembly, grounded on
//! `rpg_nav::context::build_context_pack`'s search → neighbor-expand →
//! budget-trim shape, replacing its BFS-expansion/pop-lowest trim with the
//! spec's explicit relevance fusion formula and greedy admission order.

use crate::engine::QueryEngine;
use codegraph_core::{CoreResult, Entity, GraphStore};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const SEMANTIC_WEIGHT: f64 = 0.7;
const GRAPH_WEIGHT: f64 = 0.3;
const HEADER: &str = "# Relevant code context\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    Semantic,
    Graph,
    Both,
    Manual,
}

#[derive(Debug, Clone)]
pub struct ScoredEntity {
    pub entity: Entity,
    pub relevance: f64,
    pub source: MatchSource,
    pub graph_distance: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ContextResult {
    pub context: String,
    pub included_entity_ids: Vec<String>,
    pub excluded_entity_ids: Vec<String>,
    pub total_tokens: usize,
    pub token_budget: usize,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub total_tokens: usize,
    pub token_budget: usize,
    pub entities_count: usize,
    pub message: String,
}

pub struct ContextAssembler {
    engine: Arc<QueryEngine>,
    graph_store: Arc<dyn GraphStore>,
}

impl ContextAssembler {
    pub fn new(engine: Arc<QueryEngine>, graph_store: Arc<dyn GraphStore>) -> Self {
        Self { engine, graph_store }
    }

    pub async fn retrieve_context(
        &self,
        query: &str,
        project_id: &str,
        token_budget: usize,
        manual_entity_ids: Option<&[String]>,
    ) -> CoreResult<ContextResult> {
        let ranked = self.rank(query, project_id, manual_entity_ids).await?;
        Ok(assemble(ranked, token_budget))
    }

    /// Runs the same ranking and assembly as `retrieve_context` but returns
    /// only the summary, not the assembled string.
    pub async fn validate_context(
        &self,
        query: &str,
        project_id: &str,
        token_budget: usize,
        manual_entity_ids: Option<&[String]>,
    ) -> CoreResult<ValidationResult> {
        let ranked = self.rank(query, project_id, manual_entity_ids).await?;
        let entities_count = ranked.len();
        let result = assemble(ranked, token_budget);
        let valid = result.total_tokens <= token_budget;
        let message = if valid {
            format!("{} entities fit within a budget of {token_budget} tokens", result.included_entity_ids.len())
        } else {
            format!(
                "only {} of {entities_count} entities fit within a budget of {token_budget} tokens",
                result.included_entity_ids.len()
            )
        };
        Ok(ValidationResult { valid, total_tokens: result.total_tokens, token_budget, entities_count, message })
    }

    async fn rank(
        &self,
        query: &str,
        project_id: &str,
        manual_entity_ids: Option<&[String]>,
    ) -> CoreResult<Vec<ScoredEntity>> {
        if let Some(ids) = manual_entity_ids {
            return self.rank_manual(ids, project_id).await;
        }

        let project_ids = vec![project_id.to_string()];
        let search = self.engine.semantic_search(query, &project_ids, 10).await?;

        let mut semantic_scores: HashMap<String, f64> = HashMap::new();
        for hit in &search.results {
            semantic_scores.insert(hit.entity_id.clone(), f64::from(hit.similarity));
        }

        let mut graph_distances: HashMap<String, usize> = HashMap::new();
        for hit in &search.results {
            let callers = self.engine.find_callers(&hit.entity_id, project_id).await?;
            let dependencies = self.engine.find_dependencies(&hit.entity_id, project_id).await?;
            for neighbor in callers.entities.into_iter().chain(dependencies.entities) {
                if semantic_scores.contains_key(&neighbor.id) {
                    continue;
                }
                graph_distances.entry(neighbor.id).or_insert(1);
            }
        }

        let mut all_ids: HashSet<String> = semantic_scores.keys().cloned().collect();
        all_ids.extend(graph_distances.keys().cloned());

        let mut ranked = Vec::with_capacity(all_ids.len());
        for id in all_ids {
            let Some(entity) = self.graph_store.get_entity(&id, project_id).await? else { continue };
            let semantic = semantic_scores.get(&id).copied();
            let distance = graph_distances.get(&id).copied();
            let (relevance, source) = match (semantic, distance) {
                (Some(s), Some(d)) => (SEMANTIC_WEIGHT * s + GRAPH_WEIGHT * (1.0 / d as f64), MatchSource::Both),
                (Some(s), None) => (SEMANTIC_WEIGHT * s, MatchSource::Semantic),
                (None, Some(d)) => (GRAPH_WEIGHT * (1.0 / d as f64), MatchSource::Graph),
                (None, None) => continue,
            };
            ranked.push(ScoredEntity { entity, relevance, source, graph_distance: distance });
        }

        ranked.sort_by(|a, b| b.relevance.partial_cmp(&a.relevance).unwrap_or(std::cmp::Ordering::Equal));
        Ok(ranked)
    }

    async fn rank_manual(&self, ids: &[String], project_id: &str) -> CoreResult<Vec<ScoredEntity>> {
        let mut ranked = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entity) = self.graph_store.get_entity(id, project_id).await? {
                ranked.push(ScoredEntity { entity, relevance: 1.0, source: MatchSource::Manual, graph_distance: None });
            }
        }
        Ok(ranked)
    }
}

fn assemble(ranked: Vec<ScoredEntity>, token_budget: usize) -> ContextResult {
    let mut included_entity_ids = Vec::new();
    let mut excluded_entity_ids = Vec::new();
    let mut blocks: Vec<String> = Vec::new();
    let mut total_tokens = estimate_tokens(HEADER);

    // Stop before the next block would cross the budget; never force-admit
    // a block that alone exceeds it, even as the first one.
    for scored in &ranked {
        let block = citation_block(&scored.entity);
        let block_tokens = estimate_tokens(&block);
        if total_tokens + block_tokens > token_budget {
            excluded_entity_ids.push(scored.entity.id.clone());
            continue;
        }
        total_tokens += block_tokens;
        included_entity_ids.push(scored.entity.id.clone());
        blocks.push(block);
    }

    let context = format!("{HEADER}\n{}", blocks.join("\n\n"));
    ContextResult { context, included_entity_ids, excluded_entity_ids, total_tokens, token_budget }
}

fn citation_block(entity: &Entity) -> String {
    let body = entity
        .signature
        .clone()
        .or_else(|| entity.body.clone())
        .unwrap_or_else(|| format!("{}: {}", entity.kind, entity.name));
    let mut block = format!("[File: {}, Lines: {}-{}]\n{}", entity.file_path, entity.start_line, entity.end_line, body);
    if let Some(docstring) = &entity.docstring {
        block.push_str(&format!("\n\"\"\"{docstring}\"\"\""));
    }
    block
}

/// One token per four characters, per §4.8 — an approximation, not a real
/// tokenizer, matching `rpg_nav::context::estimate_tokens`'s same ratio.
fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::{EntityKind, Language};
    use std::collections::BTreeMap;

    fn entity(id: &str, signature: Option<&str>) -> Entity {
        Entity {
            id: id.to_string(),
            project_id: "P".to_string(),
            kind: EntityKind::Function,
            name: id.to_string(),
            file_path: "m.py".to_string(),
            start_line: 1,
            end_line: 2,
            language: Language::Python,
            signature: signature.map(str::to_string),
            docstring: None,
            body: None,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn citation_block_matches_the_fixed_format() {
        let e = entity("e1", Some("def add(a, b):"));
        let block = citation_block(&e);
        assert!(block.starts_with("[File: m.py, Lines: 1-2]\ndef add(a, b):"));
    }

    #[test]
    fn assemble_never_exceeds_budget_even_for_the_first_block() {
        let ranked = vec![ScoredEntity {
            entity: entity("e1", Some(&"x".repeat(2000))),
            relevance: 1.0,
            source: MatchSource::Manual,
            graph_distance: None,
        }];
        let result = assemble(ranked, 10);
        assert!(result.included_entity_ids.is_empty());
        assert_eq!(result.excluded_entity_ids, vec!["e1".to_string()]);
        assert!(result.total_tokens <= result.token_budget);
    }

    #[test]
    fn assemble_excludes_once_budget_is_exceeded() {
        let ranked = vec![
            ScoredEntity { entity: entity("e1", Some(&"x".repeat(40))), relevance: 1.0, source: MatchSource::Manual, graph_distance: None },
            ScoredEntity { entity: entity("e2", Some(&"y".repeat(40))), relevance: 0.9, source: MatchSource::Manual, graph_distance: None },
        ];
        let result = assemble(ranked, 15);
        assert_eq!(result.included_entity_ids, vec!["e1".to_string()]);
        assert_eq!(result.excluded_entity_ids, vec!["e2".to_string()]);
    }
}
