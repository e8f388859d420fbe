//! Local, file-backed `GraphStore` reference implementation.
//!
//! One JSON document per project under `<data_dir>/graphs/<project_id>.json`,
//! guarded by an in-process `RwLock` and written with the rename-on-write
//! idiom `rpg-core::storage::save` uses for `.rpg/graph.json`: write to a
//! sibling temp file, then rename, so a crash mid-write never leaves a
//! half-written document in place of the real one.

use crate::error::{CoreError, CoreResult};
use crate::graph_store::{
    ClassHierarchy, CyclePath, GraphCoverage, GraphEdge, GraphFilters, GraphNode, GraphStore,
    ImpactEntry, ImpactResult, VisualizationResult, ViewMode,
};
use crate::model::{Entity, EntityKind, Project, ProjectStatus, Relationship, RelationshipKind, is_external_module_id};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ProjectGraph {
    project: Option<Project>,
    entities: BTreeMap<String, Entity>,
    relationships: Vec<Relationship>,
}

impl ProjectGraph {
    fn outgoing(&self, source_id: &str, kinds: &[RelationshipKind]) -> Vec<&Relationship> {
        self.relationships
            .iter()
            .filter(|r| r.source_id == source_id && kinds.contains(&r.kind))
            .collect()
    }

    fn incoming(&self, target_id: &str, kinds: &[RelationshipKind]) -> Vec<&Relationship> {
        self.relationships
            .iter()
            .filter(|r| r.target_id == target_id && kinds.contains(&r.kind))
            .collect()
    }

    fn dedup_relationships(&mut self) {
        let mut seen = HashSet::new();
        self.relationships.retain(|r| seen.insert(r.dedup_key()));
    }

    fn refresh_counts(&mut self) {
        if let Some(project) = self.project.as_mut() {
            project.entity_count = self.entities.len();
            project.file_count = self
                .entities
                .values()
                .filter(|e| e.kind == EntityKind::File)
                .count();
        }
    }
}

pub struct LocalGraphStore {
    dir: PathBuf,
    cache: Arc<RwLock<HashMap<String, ProjectGraph>>>,
}

impl LocalGraphStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: data_dir.as_ref().join("graphs"),
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn path_for(&self, project_id: &str) -> PathBuf {
        self.dir.join(format!("{project_id}.json"))
    }

    async fn load(&self, project_id: &str) -> CoreResult<ProjectGraph> {
        if let Some(graph) = self.cache.read().await.get(project_id) {
            return Ok(graph.clone());
        }
        let path = self.path_for(project_id);
        if !path.exists() {
            return Ok(ProjectGraph::default());
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| CoreError::Internal(format!("reading {}: {e}", path.display())))?;
        let graph: ProjectGraph = serde_json::from_str(&raw)
            .map_err(|e| CoreError::Internal(format!("parsing {}: {e}", path.display())))?;
        self.cache.write().await.insert(project_id.to_string(), graph.clone());
        Ok(graph)
    }

    /// Commits `graph` to memory and disk atomically: the temp file is
    /// written and renamed before the in-memory cache is updated, so a
    /// failure here leaves both representations at their prior state.
    async fn commit(&self, project_id: &str, graph: ProjectGraph) -> CoreResult<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| CoreError::Internal(format!("creating graph dir: {e}")))?;
        let path = self.path_for(project_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&graph)
            .map_err(|e| CoreError::Internal(format!("serializing graph: {e}")))?;
        std::fs::write(&tmp, json)
            .map_err(|e| CoreError::Internal(format!("writing {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| CoreError::Internal(format!("renaming {}: {e}", tmp.display())))?;
        self.cache.write().await.insert(project_id.to_string(), graph);
        Ok(())
    }
}

#[async_trait]
impl GraphStore for LocalGraphStore {
    async fn create_project(
        &self,
        mut project: Project,
        entities: Vec<Entity>,
        relationships: Vec<Relationship>,
    ) -> CoreResult<()> {
        let mut seen = HashSet::new();
        for entity in &entities {
            if !seen.insert(entity.id.clone()) {
                return Err(CoreError::DatabaseQuery(format!(
                    "duplicate entity id in batch: {}",
                    entity.id
                )));
            }
        }

        let mut graph = ProjectGraph {
            project: None,
            entities: entities.into_iter().map(|e| (e.id.clone(), e)).collect(),
            relationships,
        };
        graph.dedup_relationships();
        graph.project = Some({
            project.entity_count = graph.entities.len();
            project.file_count = graph
                .entities
                .values()
                .filter(|e| e.kind == EntityKind::File)
                .count();
            project
        });

        self.commit(&project.id.clone(), graph).await
    }

    async fn create_entities(&self, project_id: &str, entities: Vec<Entity>) -> CoreResult<()> {
        let mut graph = self.load(project_id).await?;
        for entity in entities {
            if graph.entities.contains_key(&entity.id) {
                return Err(CoreError::DatabaseQuery(format!(
                    "duplicate entity id: {}",
                    entity.id
                )));
            }
            graph.entities.insert(entity.id.clone(), entity);
        }
        graph.refresh_counts();
        self.commit(project_id, graph).await
    }

    async fn create_relationships(&self, relationships: Vec<Relationship>) -> CoreResult<usize> {
        let mut by_project: HashMap<String, Vec<Relationship>> = HashMap::new();
        // The local store doesn't know project scoping from the edge alone;
        // resolve it by checking every known project graph for the source id.
        let projects: Vec<String> = self.cache.read().await.keys().cloned().collect();
        let mut dropped = 0usize;

        for rel in relationships {
            let mut placed = false;
            for project_id in &projects {
                let graph = self.load(project_id).await?;
                if graph.entities.contains_key(&rel.source_id) {
                    by_project.entry(project_id.clone()).or_default().push(rel.clone());
                    placed = true;
                    break;
                }
            }
            if !placed {
                dropped += 1;
            }
        }

        for (project_id, rels) in by_project {
            let mut graph = self.load(&project_id).await?;
            for rel in rels {
                let target_ok = rel.kind == RelationshipKind::Imports && is_external_module_id(&rel.target_id)
                    || graph.entities.contains_key(&rel.target_id);
                if target_ok {
                    graph.relationships.push(rel);
                } else {
                    dropped += 1;
                    warn!(source = %rel.source_id, target = %rel.target_id, "dropping edge with missing endpoint");
                }
            }
            graph.dedup_relationships();
            self.commit(&project_id, graph).await?;
        }

        Ok(dropped)
    }

    async fn find_callers(&self, entity_id: &str, project_id: &str) -> CoreResult<Vec<Entity>> {
        let graph = self.load(project_id).await?;
        let callers = graph
            .incoming(entity_id, &[RelationshipKind::Calls])
            .into_iter()
            .filter_map(|r| graph.entities.get(&r.source_id).cloned())
            .collect();
        Ok(callers)
    }

    async fn find_dependencies(&self, entity_id: &str, project_id: &str) -> CoreResult<Vec<Entity>> {
        let graph = self.load(project_id).await?;
        let deps = graph
            .outgoing(entity_id, &[RelationshipKind::Calls, RelationshipKind::Uses])
            .into_iter()
            .filter_map(|r| graph.entities.get(&r.target_id).cloned())
            .collect();
        Ok(deps)
    }

    async fn get_class_hierarchy(&self, class_id: &str) -> CoreResult<ClassHierarchy> {
        // Class ids are project-prefixed; find which cached/disk project owns it.
        let project_id = self.project_owning(class_id).await?;
        let graph = self.load(&project_id).await?;
        let kinds = [RelationshipKind::Extends, RelationshipKind::Implements];
        let parents = graph
            .outgoing(class_id, &kinds)
            .into_iter()
            .map(|r| r.target_id.clone())
            .collect();
        let children = graph
            .incoming(class_id, &kinds)
            .into_iter()
            .map(|r| r.source_id.clone())
            .collect();
        Ok(ClassHierarchy {
            root: class_id.to_string(),
            parents,
            children,
        })
    }

    async fn impact_analysis(
        &self,
        entity_id: &str,
        project_id: &str,
        max_depth: usize,
    ) -> CoreResult<ImpactResult> {
        let graph = self.load(project_id).await?;
        let mut entries = Vec::new();
        let mut cycle_paths = Vec::new();
        let mut visited_with_depth: HashMap<String, usize> = HashMap::new();
        let mut truncated = false;

        let mut queue: VecDeque<(String, usize, Vec<String>)> =
            VecDeque::from([(entity_id.to_string(), 0, vec![entity_id.to_string()])]);

        while let Some((current, depth, path)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for rel in graph.outgoing(&current, &[RelationshipKind::Calls]) {
                let next = rel.target_id.clone();
                let next_depth = depth + 1;

                let mut next_path = path.clone();
                next_path.push(next.clone());

                if let Some(pos) = path.iter().position(|id| id == &next) {
                    let mut cycle = path[pos..].to_vec();
                    cycle.push(next.clone());
                    cycle_paths.push(CyclePath { cycle });

                    // Record the repeated node as a dependency once, same as
                    // any other entry, but don't re-enqueue it: the cycle is
                    // already captured above and re-enqueuing would expand
                    // forever.
                    if visited_with_depth
                        .get(&next)
                        .is_none_or(|&seen_depth| next_depth < seen_depth)
                    {
                        visited_with_depth.insert(next.clone(), next_depth);
                        entries.push(ImpactEntry {
                            entity_id: next.clone(),
                            depth: next_depth,
                            path: next_path,
                        });
                        if next_depth == max_depth {
                            truncated = true;
                        }
                    }
                    continue;
                }

                if visited_with_depth
                    .get(&next)
                    .is_none_or(|&seen_depth| next_depth < seen_depth)
                {
                    visited_with_depth.insert(next.clone(), next_depth);
                    entries.push(ImpactEntry {
                        entity_id: next.clone(),
                        depth: next_depth,
                        path: next_path.clone(),
                    });
                    if next_depth == max_depth {
                        truncated = true;
                    }
                    queue.push_back((next, next_depth, next_path));
                }
            }
        }

        Ok(ImpactResult {
            total_affected: entries.len(),
            has_cycles: !cycle_paths.is_empty(),
            truncated,
            cycle_paths,
            entries,
        })
    }

    async fn get_project_graph(
        &self,
        project_id: &str,
        filters: &GraphFilters,
    ) -> CoreResult<VisualizationResult> {
        let graph = self.load(project_id).await?;
        let coverage = GraphCoverage {
            entities_in_project: graph.entities.len(),
            relationships_in_project: graph.relationships.len(),
        };

        let (mut nodes, mut edges) = match filters.view_mode {
            ViewMode::File => self.file_view(&graph, filters),
            ViewMode::Symbol => self.symbol_view(&graph, filters),
        };

        nodes.sort_by(|a, b| (&a.node_type, &a.label, &a.id).cmp(&(&b.node_type, &b.label, &b.id)));
        edges.sort_by(|a, b| (&a.source, &a.target, &a.edge_type).cmp(&(&b.source, &b.target, &b.edge_type)));

        let mut truncated = false;
        if nodes.len() > filters.max_nodes {
            nodes.truncate(filters.max_nodes);
            truncated = true;
        }
        let present: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        edges.retain(|e| present.contains(e.source.as_str()) && present.contains(e.target.as_str()));
        if edges.len() > filters.max_edges {
            edges.truncate(filters.max_edges);
            truncated = true;
        }

        if !filters.include_isolated {
            let connected: HashSet<&str> = edges
                .iter()
                .flat_map(|e| [e.source.as_str(), e.target.as_str()])
                .collect();
            nodes.retain(|n| connected.contains(n.id.as_str()));
        }

        let mut stats_by_type: BTreeMap<String, usize> = BTreeMap::new();
        for node in &nodes {
            *stats_by_type.entry(node.node_type.clone()).or_insert(0) += 1;
        }

        Ok(VisualizationResult {
            nodes,
            edges,
            stats_by_type,
            coverage,
            truncated,
        })
    }

    async fn update_project(
        &self,
        project_id: &str,
        changed: Vec<(Entity, Vec<Relationship>)>,
        deleted_files: Vec<String>,
    ) -> CoreResult<()> {
        let mut graph = self.load(project_id).await?;
        let changed_files: HashSet<String> = changed.iter().map(|(e, _)| e.file_path.clone()).collect();
        let files_to_clear: HashSet<String> = deleted_files.into_iter().chain(changed_files).collect();

        let removed_ids: HashSet<String> = graph
            .entities
            .values()
            .filter(|e| files_to_clear.contains(&e.file_path))
            .map(|e| e.id.clone())
            .collect();
        graph.entities.retain(|id, _| !removed_ids.contains(id));
        graph
            .relationships
            .retain(|r| !removed_ids.contains(&r.source_id) && !removed_ids.contains(&r.target_id));

        for (entity, rels) in changed {
            graph.entities.insert(entity.id.clone(), entity);
            graph.relationships.extend(rels);
        }
        graph.dedup_relationships();
        graph.refresh_counts();
        self.commit(project_id, graph).await
    }

    async fn delete_project(&self, project_id: &str) -> CoreResult<()> {
        self.cache.write().await.remove(project_id);
        let path = self.path_for(project_id);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| CoreError::Internal(format!("deleting {}: {e}", path.display())))?;
        }
        Ok(())
    }

    async fn get_entity(&self, entity_id: &str, project_id: &str) -> CoreResult<Option<Entity>> {
        let graph = self.load(project_id).await?;
        Ok(graph.entities.get(entity_id).cloned())
    }

    async fn get_project(&self, project_id: &str) -> CoreResult<Option<Project>> {
        let graph = self.load(project_id).await?;
        Ok(graph.project)
    }

    async fn list_projects(&self) -> CoreResult<Vec<Project>> {
        let mut projects = Vec::new();
        if self.dir.exists() {
            for entry in std::fs::read_dir(&self.dir)
                .map_err(|e| CoreError::Internal(format!("listing {}: {e}", self.dir.display())))?
            {
                let entry = entry.map_err(|e| CoreError::Internal(e.to_string()))?;
                let stem = entry.path().file_stem().map(|s| s.to_string_lossy().into_owned());
                if let Some(project_id) = stem {
                    if let Some(project) = self.load(&project_id).await?.project {
                        projects.push(project);
                    }
                }
            }
        }
        Ok(projects)
    }

    async fn ensure_indexes(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| CoreError::Internal(format!("creating graph dir: {e}")))?;
        info!(dir = %self.dir.display(), "local graph store ready (index setup is a no-op for JSON files)");
        Ok(())
    }
}

impl LocalGraphStore {
    async fn project_owning(&self, entity_or_class_id: &str) -> CoreResult<String> {
        // Deterministic ids are prefixed with the project id followed by `_`.
        entity_or_class_id
            .split('_')
            .next()
            .map(str::to_string)
            .filter(|_| true)
            .ok_or_else(|| CoreError::EntityNotFound(entity_or_class_id.to_string()))
    }

    fn file_view(&self, graph: &ProjectGraph, filters: &GraphFilters) -> (Vec<GraphNode>, Vec<GraphEdge>) {
        let files: Vec<&Entity> = graph.entities.values().filter(|e| e.kind == EntityKind::File).collect();
        let nodes = files
            .iter()
            .map(|e| GraphNode {
                id: e.id.clone(),
                label: e.file_path.clone(),
                node_type: "file".to_string(),
            })
            .collect();

        let file_ids: HashSet<&str> = files.iter().map(|e| e.id.as_str()).collect();
        let edges = graph
            .relationships
            .iter()
            .filter(|r| r.kind == RelationshipKind::Imports && file_ids.contains(r.source_id.as_str()))
            .filter(|r| file_ids.contains(r.target_id.as_str()) || (filters.include_external && is_external_module_id(&r.target_id)))
            .map(|r| GraphEdge {
                source: r.source_id.clone(),
                target: r.target_id.clone(),
                edge_type: r.kind.to_string(),
            })
            .collect();

        (nodes, edges)
    }

    fn symbol_view(&self, graph: &ProjectGraph, filters: &GraphFilters) -> (Vec<GraphNode>, Vec<GraphEdge>) {
        let matches = |e: &Entity| -> bool {
            if let Some(types) = &filters.entity_types {
                if !types.iter().any(|t| t.eq_ignore_ascii_case(e.kind.as_str())) {
                    return false;
                }
            }
            if let Some(langs) = &filters.languages {
                if !langs.iter().any(|l| l.eq_ignore_ascii_case(e.language.as_str())) {
                    return false;
                }
            }
            if let Some(patterns) = &filters.file_patterns {
                if !patterns.iter().any(|p| e.file_path.contains(p.as_str())) {
                    return false;
                }
            }
            true
        };

        let selected: Vec<&Entity> = graph.entities.values().filter(|e| matches(e)).collect();
        let selected_ids: HashSet<&str> = selected.iter().map(|e| e.id.as_str()).collect();

        let nodes = selected
            .iter()
            .map(|e| GraphNode {
                id: e.id.clone(),
                label: e.name.clone(),
                node_type: e.kind.to_string(),
            })
            .collect();

        let edges = graph
            .relationships
            .iter()
            .filter(|r| selected_ids.contains(r.source_id.as_str()))
            .filter(|r| {
                selected_ids.contains(r.target_id.as_str())
                    || (filters.include_external && is_external_module_id(&r.target_id))
            })
            .map(|r| GraphEdge {
                source: r.source_id.clone(),
                target: r.target_id.clone(),
                edge_type: r.kind.to_string(),
            })
            .collect();

        (nodes, edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Language;

    fn entity(id: &str, kind: EntityKind, file: &str) -> Entity {
        Entity {
            id: id.to_string(),
            project_id: "P".to_string(),
            kind,
            name: id.to_string(),
            file_path: file.to_string(),
            start_line: 1,
            end_line: 2,
            language: Language::Python,
            signature: None,
            docstring: None,
            body: None,
            metadata: BTreeMap::new(),
        }
    }

    fn project(id: &str) -> Project {
        Project {
            id: id.to_string(),
            name: "proj".to_string(),
            owner_id: "owner".to_string(),
            created_at: chrono::Utc::now(),
            file_count: 0,
            entity_count: 0,
            status: ProjectStatus::Active,
        }
    }

    #[tokio::test]
    async fn atomic_create_makes_everything_visible_at_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalGraphStore::new(dir.path());
        let entities = vec![entity("P_function_add_1_aaaa", EntityKind::Function, "m.py")];
        let rels = vec![Relationship::new("P_file_m_1_bbbb", "P_function_add_1_aaaa", RelationshipKind::Defines)];
        store.create_project(project("P"), entities, rels).await.unwrap();

        let fetched = store.get_entity("P_function_add_1_aaaa", "P").await.unwrap();
        assert!(fetched.is_some());
        let proj = store.get_project("P").await.unwrap().unwrap();
        assert_eq!(proj.entity_count, 1);
    }

    #[tokio::test]
    async fn duplicate_entity_id_in_batch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalGraphStore::new(dir.path());
        let entities = vec![
            entity("dup", EntityKind::Function, "m.py"),
            entity("dup", EntityKind::Function, "m.py"),
        ];
        let result = store.create_project(project("P"), entities, vec![]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn impact_analysis_reports_explicit_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalGraphStore::new(dir.path());
        let entities = vec![
            entity("A", EntityKind::Function, "m.py"),
            entity("B", EntityKind::Function, "m.py"),
            entity("C", EntityKind::Function, "m.py"),
        ];
        let rels = vec![
            Relationship::new("A", "B", RelationshipKind::Calls),
            Relationship::new("B", "C", RelationshipKind::Calls),
            Relationship::new("C", "A", RelationshipKind::Calls),
        ];
        store.create_project(project("P"), entities, rels).await.unwrap();

        let result = store.impact_analysis("A", "P", 5).await.unwrap();
        assert!(result.has_cycles);
        let cycle = &result.cycle_paths[0].cycle;
        assert!(cycle.len() >= 2);
        assert_eq!(cycle.first(), cycle.last());
    }

    #[tokio::test]
    async fn visualization_truncates_and_flags() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalGraphStore::new(dir.path());
        let entities = vec![
            entity("f1", EntityKind::File, "a.py"),
            entity("f2", EntityKind::File, "b.py"),
            entity("f3", EntityKind::File, "c.py"),
        ];
        let rels = vec![
            Relationship::new("f1", "f2", RelationshipKind::Imports),
            Relationship::new("f2", "f3", RelationshipKind::Imports),
        ];
        store.create_project(project("P"), entities, rels).await.unwrap();

        let filters = GraphFilters {
            view_mode: ViewMode::File,
            max_nodes: 2,
            ..GraphFilters::default()
        };
        let result = store.get_project_graph("P", &filters).await.unwrap();
        assert_eq!(result.nodes.len(), 2);
        assert!(result.truncated);
        assert_eq!(result.coverage.entities_in_project, 3);
    }
}
