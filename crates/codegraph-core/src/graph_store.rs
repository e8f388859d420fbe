//! GraphStore adapter surface (§4.3).
//!
//! Callers operate on typed entities and relationships; the adapter is the
//! only component that knows the storage dialect. `codegraph_core::local`
//! ships a reference implementation backed by local JSON files, the same
//! precedent the teacher repo follows (`rpg-core::storage` persists to disk
//! rather than a real graph database) — a production deployment swaps in a
//! different `GraphStore` impl without touching any caller.

use crate::error::CoreResult;
use crate::model::{Entity, Project, RelationshipKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One hop of an impact-analysis path: the edge kind traversed and the
/// entity id landed on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactStep {
    pub entity_id: String,
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactEntry {
    pub entity_id: String,
    pub depth: usize,
    pub path: Vec<String>,
}

/// A detected cycle: the subsequence from the first repeated node to the
/// repeat, with `cycle.first() == cycle.last()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CyclePath {
    pub cycle: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImpactResult {
    pub entries: Vec<ImpactEntry>,
    pub total_affected: usize,
    pub has_cycles: bool,
    pub cycle_paths: Vec<CyclePath>,
    pub truncated: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassHierarchy {
    pub root: String,
    pub parents: Vec<String>,
    pub children: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    File,
    Symbol,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphFilters {
    pub view_mode: ViewMode,
    pub entity_types: Option<Vec<String>>,
    pub languages: Option<Vec<String>>,
    pub file_patterns: Option<Vec<String>>,
    pub include_external: bool,
    pub include_isolated: bool,
    pub max_nodes: usize,
    pub max_edges: usize,
}

impl Default for GraphFilters {
    fn default() -> Self {
        Self {
            view_mode: ViewMode::Symbol,
            entity_types: None,
            languages: None,
            file_patterns: None,
            include_external: true,
            include_isolated: true,
            max_nodes: 500,
            max_edges: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub node_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub edge_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphCoverage {
    pub entities_in_project: usize,
    pub relationships_in_project: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualizationResult {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub stats_by_type: std::collections::BTreeMap<String, usize>,
    pub coverage: GraphCoverage,
    pub truncated: bool,
}

use crate::model::Relationship;

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Atomic: if any step fails, none of `entities`/`relationships` nor the
    /// project node are visible; on success denormalized counts are updated.
    async fn create_project(
        &self,
        project: Project,
        entities: Vec<Entity>,
        relationships: Vec<Relationship>,
    ) -> CoreResult<()>;

    async fn create_entities(&self, project_id: &str, entities: Vec<Entity>) -> CoreResult<()>;

    /// Returns the number of edges dropped for missing endpoints.
    async fn create_relationships(&self, relationships: Vec<Relationship>) -> CoreResult<usize>;

    async fn find_callers(&self, entity_id: &str, project_id: &str) -> CoreResult<Vec<Entity>>;

    async fn find_dependencies(&self, entity_id: &str, project_id: &str) -> CoreResult<Vec<Entity>>;

    async fn get_class_hierarchy(&self, class_id: &str) -> CoreResult<ClassHierarchy>;

    async fn impact_analysis(
        &self,
        entity_id: &str,
        project_id: &str,
        max_depth: usize,
    ) -> CoreResult<ImpactResult>;

    async fn get_project_graph(
        &self,
        project_id: &str,
        filters: &GraphFilters,
    ) -> CoreResult<VisualizationResult>;

    async fn update_project(
        &self,
        project_id: &str,
        changed: Vec<(Entity, Vec<Relationship>)>,
        deleted_files: Vec<String>,
    ) -> CoreResult<()>;

    async fn delete_project(&self, project_id: &str) -> CoreResult<()>;

    async fn get_entity(&self, entity_id: &str, project_id: &str) -> CoreResult<Option<Entity>>;

    async fn get_project(&self, project_id: &str) -> CoreResult<Option<Project>>;

    async fn list_projects(&self) -> CoreResult<Vec<Project>>;

    /// Idempotent DDL; failure is logged and non-fatal in the caller.
    async fn ensure_indexes(&self) -> CoreResult<()>;

    /// RelationshipKind values this store has edges for, per-project; used
    /// by impact analysis to decide which kinds count as "dependency" edges.
    fn dependency_edge_kinds(&self) -> &'static [RelationshipKind] {
        &[RelationshipKind::Calls, RelationshipKind::Uses]
    }
}
