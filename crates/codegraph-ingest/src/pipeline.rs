//! The `ProcessProject` job (§4.6): parse, enrich, store, embed, in that
//! order, advancing the persisted `Session` at each step so a caller polling
//! `get_session` sees monotonic progress even if the job runs on a
//! different worker than the one that accepted the upload.

use crate::dispatch::{PipelineRun, ProcessProjectPayload};
use async_trait::async_trait;
use codegraph_core::config::EmbeddingConfig;
use codegraph_core::model::{Project, ProjectStatus, SessionStatus};
use codegraph_core::{CoreResult, Entity, GraphStore, VectorStore};
use codegraph_core::session_store::SessionStore;
use codegraph_core::vector_store::{VectorEntry, VectorMetadata};
use codegraph_embed::EmbeddingClient;
use codegraph_parser::enrichment::{self, ParsedFile};
use codegraph_parser::{parse_file, ParseOutput};
use std::sync::Arc;

pub struct PipelineRunner {
    pub graph_store: Arc<dyn GraphStore>,
    pub vector_store: Arc<dyn VectorStore>,
    pub embedding_client: Arc<EmbeddingClient>,
    pub embedding_config: EmbeddingConfig,
    pub sessions: Arc<SessionStore>,
}

#[async_trait]
impl PipelineRun for PipelineRunner {
    async fn run(&self, payload: ProcessProjectPayload) {
        if let Err(err) = self.process(&payload).await {
            self.fail(&payload.session_id, &err.to_string()).await;
        }
    }
}

impl PipelineRunner {
    async fn process(&self, payload: &ProcessProjectPayload) -> CoreResult<()> {
        tracing::info!("processing project {} ({} files)", payload.project_id, payload.files.len());
        self.advance(&payload.session_id, SessionStatus::Processing, 0.0).await;

        // Step 1: parse every file independently.
        let mut files: Vec<ParsedFile> = Vec::with_capacity(payload.files.len());
        let mut entities: Vec<Entity> = Vec::new();
        for (path, content) in &payload.files {
            let ParseOutput { result, file_imports } = parse_file(path, content, &payload.project_id, None);
            if !result.errors.is_empty() {
                tracing::warn!("{}: {} parse error(s)", path, result.errors.len());
            }
            let Some(file_entity) = result.entities.iter().find(|e| e.kind == codegraph_core::EntityKind::File) else {
                continue;
            };
            let language = file_entity.language;
            entities.extend(result.entities.clone());
            files.push(ParsedFile {
                path: path.clone(),
                language,
                file_entity_id: file_imports.file_entity_id,
                entities: result.entities,
                relationships: result.relationships,
                imports: file_imports.imports,
            });
        }
        self.advance(&payload.session_id, SessionStatus::Processing, 0.2).await;

        // Step 2: project-level enrichment (cross-file import resolution).
        enrichment::resolve_imports(&mut files, None);
        let mut relationships = Vec::new();
        for file in &files {
            relationships.extend(file.relationships.clone());
        }
        self.advance(&payload.session_id, SessionStatus::Processing, 0.4).await;

        // Step 3: persist the project graph.
        let project = Project {
            id: payload.project_id.clone(),
            name: payload.project_name.clone(),
            owner_id: payload.owner_id.clone(),
            created_at: chrono::Utc::now(),
            file_count: payload.files.len(),
            entity_count: entities.len(),
            status: ProjectStatus::Active,
        };
        self.graph_store.create_project(project, entities.clone(), relationships).await?;
        self.advance(&payload.session_id, SessionStatus::Processing, 0.7).await;

        // Step 4: embed every entity eligible for semantic search.
        self.vector_store.ensure_collection(&payload.project_id).await?;
        let embeddable: Vec<&Entity> =
            entities.iter().filter(|e| e.kind != codegraph_core::EntityKind::Import).collect();
        let mut vector_entries = Vec::with_capacity(embeddable.len());
        for entity in &embeddable {
            let vector = self
                .embedding_client
                .generate_for_entity(entity, true)
                .await
                .map_err(codegraph_core::CoreError::from)?;
            vector_entries.push(VectorEntry {
                entity_id: entity.id.clone(),
                vector,
                metadata: VectorMetadata {
                    kind: entity.kind.as_str().to_string(),
                    file_path: entity.file_path.clone(),
                    name: entity.name.clone(),
                    project_id: entity.project_id.clone(),
                },
            });
        }
        self.advance(&payload.session_id, SessionStatus::Processing, 0.9).await;

        // Step 5: persist the embeddings.
        self.vector_store.batch_store(vector_entries).await?;

        // Step 6: finalize the session.
        if let Some(mut session) = self.sessions.load(&payload.session_id).await? {
            session.files_processed = payload.files.len();
            session.entities_extracted = entities.len();
            session.statistics.insert(
                "embedding_model".to_string(),
                serde_json::json!(self.embedding_config.model),
            );
            session.advance(SessionStatus::Completed, 1.0);
            self.sessions.save(&session).await?;
        }
        Ok(())
    }

    async fn advance(&self, session_id: &str, status: SessionStatus, progress: f64) {
        if let Ok(Some(mut session)) = self.sessions.load(session_id).await {
            session.advance(status, progress);
            let _ = self.sessions.save(&session).await;
        }
    }

    async fn fail(&self, session_id: &str, message: &str) {
        if let Ok(Some(mut session)) = self.sessions.load(session_id).await {
            session.record_error(message.to_string());
            session.advance(SessionStatus::Failed, session.progress);
            let _ = self.sessions.save(&session).await;
        }
    }
}
