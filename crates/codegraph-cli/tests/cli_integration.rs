//! Integration tests for the library stack the CLI commands wire together.
//! Exercises `IngestionCoordinator` with a fake runner and `LocalGraphStore`
//! directly, the same way `codegraph-ingest`'s own coordinator tests avoid
//! touching the live embedding model.

use async_trait::async_trait;
use codegraph_core::config::UploadConfig;
use codegraph_core::local::LocalGraphStore;
use codegraph_core::model::{Entity, EntityKind, Language, Relationship, RelationshipKind};
use codegraph_core::session_store::SessionStore;
use codegraph_core::GraphStore;
use codegraph_ingest::dispatch::{InProcessDispatch, PipelineRun, ProcessProjectPayload};
use codegraph_ingest::IngestionCoordinator;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct CountingRunner {
    runs: Arc<AtomicUsize>,
}

#[async_trait]
impl PipelineRun for CountingRunner {
    async fn run(&self, _payload: ProcessProjectPayload) {
        self.runs.fetch_add(1, Ordering::SeqCst);
    }
}

fn coordinator() -> (IngestionCoordinator, tempfile::TempDir, Arc<AtomicUsize>) {
    let dir = tempfile::tempdir().unwrap();
    let sessions = Arc::new(SessionStore::new(dir.path()));
    let runs = Arc::new(AtomicUsize::new(0));
    let runner: Arc<dyn PipelineRun> = Arc::new(CountingRunner { runs: runs.clone() });
    let coordinator = IngestionCoordinator::new(sessions, Arc::new(InProcessDispatch), runner, UploadConfig::default());
    (coordinator, dir, runs)
}

#[tokio::test]
async fn upload_project_opens_a_session_and_dispatches_once() {
    let (coordinator, _dir, runs) = coordinator();
    let session = coordinator
        .upload_project("demo", "owner-1", vec![("a.py".to_string(), "x = 1\n".to_string())])
        .await
        .unwrap();
    assert_eq!(session.total_files, 1);
    tokio::task::yield_now().await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_project_name_is_rejected_before_dispatch() {
    let (coordinator, _dir, runs) = coordinator();
    assert!(coordinator.upload_project("  ", "owner-1", vec![]).await.is_err());
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

fn entity(id: &str, name: &str, file: &str) -> Entity {
    Entity {
        id: id.to_string(),
        project_id: "P".to_string(),
        kind: EntityKind::Function,
        name: name.to_string(),
        file_path: file.to_string(),
        start_line: 1,
        end_line: 2,
        language: Language::Python,
        signature: Some(format!("def {name}():")),
        docstring: None,
        body: None,
        metadata: BTreeMap::new(),
    }
}

#[tokio::test]
async fn graph_store_resolves_callers_for_a_freshly_ingested_project() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalGraphStore::new(dir.path());

    let entities = vec![entity("P_func_main", "main", "app.py"), entity("P_func_helper", "helper", "app.py")];
    let rels = vec![Relationship::new("P_func_main", "P_func_helper", RelationshipKind::Calls)];
    store
        .create_project(
            codegraph_core::model::Project {
                id: "P".to_string(),
                name: "demo".to_string(),
                owner_id: "owner-1".to_string(),
                created_at: chrono::Utc::now(),
                file_count: 1,
                entity_count: 0,
                status: codegraph_core::model::ProjectStatus::Active,
            },
            entities,
            rels,
        )
        .await
        .unwrap();

    let callers = store.find_callers("P_func_helper", "P").await.unwrap();
    assert_eq!(callers.len(), 1);
    assert_eq!(callers[0].id, "P_func_main");
}
