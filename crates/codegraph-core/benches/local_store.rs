//! Benches the local file-backed `GraphStore` adapter at increasing project
//! size, mirroring the scaling shape of the teacher's
//! `rpg-core/benches/serialization.rs` (100/500-entity graphs) but exercised
//! against `create_project`/`find_callers`/`get_project_graph` instead of
//! raw (de)serialization, since those are the hot paths real callers drive.

use codegraph_core::graph_store::GraphFilters;
use codegraph_core::model::{Entity, EntityKind, Language, Project, ProjectStatus, Relationship, RelationshipKind};
use codegraph_core::GraphStore;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::collections::BTreeMap;

fn make_entity(project_id: &str, i: usize) -> Entity {
    Entity {
        id: format!("{project_id}_func_{i}"),
        project_id: project_id.to_string(),
        kind: EntityKind::Function,
        name: format!("func_{i}"),
        file_path: format!("module_{}.py", i / 20),
        start_line: 1,
        end_line: 10,
        language: Language::Python,
        signature: Some(format!("def func_{i}():")),
        docstring: None,
        body: Some("pass".to_string()),
        metadata: BTreeMap::new(),
    }
}

fn build_project(project_id: &str, entity_count: usize) -> (Project, Vec<Entity>, Vec<Relationship>) {
    let entities: Vec<Entity> = (0..entity_count).map(|i| make_entity(project_id, i)).collect();
    let relationships: Vec<Relationship> = (1..entity_count)
        .map(|i| {
            Relationship::new(
                format!("{project_id}_func_{i}"),
                format!("{project_id}_func_{}", i - 1),
                RelationshipKind::Calls,
            )
        })
        .collect();
    let project = Project {
        id: project_id.to_string(),
        name: "bench-project".to_string(),
        owner_id: "bench-owner".to_string(),
        created_at: chrono::DateTime::from_timestamp(0, 0).unwrap(),
        file_count: entity_count / 20 + 1,
        entity_count,
        status: ProjectStatus::Active,
    };
    (project, entities, relationships)
}

fn bench_create_project(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    for &size in &[100usize, 500] {
        c.bench_function(&format!("create_project_{size}"), |b| {
            b.iter(|| {
                let dir = tempfile::tempdir().unwrap();
                let store = codegraph_core::local::LocalGraphStore::new(dir.path());
                let (project, entities, relationships) = build_project("P", size);
                rt.block_on(store.create_project(black_box(project), entities, relationships)).unwrap();
            });
        });
    }
}

fn bench_find_callers(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    for &size in &[100usize, 500] {
        let dir = tempfile::tempdir().unwrap();
        let store = codegraph_core::local::LocalGraphStore::new(dir.path());
        let (project, entities, relationships) = build_project("P", size);
        rt.block_on(store.create_project(project, entities, relationships)).unwrap();
        let target = format!("P_func_{}", size / 2);

        c.bench_function(&format!("find_callers_{size}"), |b| {
            b.iter(|| {
                let callers = rt.block_on(store.find_callers(black_box(&target), "P")).unwrap();
                black_box(callers);
            });
        });
    }
}

fn bench_get_project_graph(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    for &size in &[100usize, 500] {
        let dir = tempfile::tempdir().unwrap();
        let store = codegraph_core::local::LocalGraphStore::new(dir.path());
        let (project, entities, relationships) = build_project("P", size);
        rt.block_on(store.create_project(project, entities, relationships)).unwrap();

        let filters = GraphFilters::default();
        c.bench_function(&format!("get_project_graph_{size}"), |b| {
            b.iter(|| {
                let graph = rt.block_on(store.get_project_graph("P", &filters)).unwrap();
                black_box(graph);
            });
        });
    }
}

criterion_group!(benches, bench_create_project, bench_find_callers, bench_get_project_graph);
criterion_main!(benches);
