//! `IngestionCoordinator` (§4.6): session lifecycle plus the two upload
//! entry points. The coordinator itself never parses or embeds anything —
//! it validates, opens a session, builds a `ProcessProjectPayload`, and
//! hands it to whichever `JobDispatch` it was built with.

use crate::dispatch::{JobDispatch, PipelineRun, ProcessProjectPayload};
use crate::error::{IngestError, IngestResult};
use crate::upload;
use codegraph_core::config::UploadConfig;
use codegraph_core::model::Session;
use codegraph_core::session_store::SessionStore;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

pub struct IngestionCoordinator {
    pub sessions: Arc<SessionStore>,
    pub dispatch: Arc<dyn JobDispatch>,
    pub runner: Arc<dyn PipelineRun>,
    pub upload_config: UploadConfig,
}

impl IngestionCoordinator {
    pub fn new(
        sessions: Arc<SessionStore>,
        dispatch: Arc<dyn JobDispatch>,
        runner: Arc<dyn PipelineRun>,
        upload_config: UploadConfig,
    ) -> Self {
        Self { sessions, dispatch, runner, upload_config }
    }

    /// Accepts `files` already read into memory (e.g. from a multipart
    /// upload), validates the upload against `UploadConfig`, opens a
    /// session, and dispatches the `ProcessProject` job.
    pub async fn upload_project(
        &self,
        project_name: &str,
        owner_id: &str,
        files: Vec<(String, String)>,
    ) -> IngestResult<Session> {
        upload::validate_project_name(project_name)?;
        upload::validate_upload_file_count(files.len(), &self.upload_config)?;
        if files.len() > self.upload_config.max_files_per_project {
            return Err(IngestError::InvalidRequest(format!(
                "project exceeds max_files_per_project ({})",
                self.upload_config.max_files_per_project
            )));
        }

        let project_id = Uuid::new_v4().to_string();
        let session_id = Uuid::new_v4().to_string();
        let session = Session::new(session_id.clone(), project_id.clone(), files.len());
        self.sessions.save(&session).await.map_err(IngestError::from)?;

        let payload = ProcessProjectPayload {
            session_id: session_id.clone(),
            project_id,
            project_name: project_name.to_string(),
            owner_id: owner_id.to_string(),
            files,
        };
        self.dispatch.dispatch(payload, self.runner.clone()).await;

        self.get_session(&session_id).await
    }

    /// Shallow-clones `repo_url` at `branch` into a scratch directory, walks
    /// it with the same exclusion rules as a direct upload, then proceeds
    /// identically to `upload_project`.
    pub async fn upload_from_source_control(
        &self,
        project_name: &str,
        owner_id: &str,
        repo_url: &str,
        branch: &str,
    ) -> IngestResult<Session> {
        upload::parse_repo_url(repo_url)?;
        let scratch = TempDir::new().map_err(IngestError::from)?;
        upload::shallow_clone(repo_url, branch, scratch.path())?;
        let files = upload::collect_project_files(scratch.path(), &self.upload_config)?;
        self.upload_project(project_name, owner_id, files).await
    }

    pub async fn get_session(&self, session_id: &str) -> IngestResult<Session> {
        self.sessions
            .load(session_id)
            .await
            .map_err(IngestError::from)?
            .ok_or_else(|| IngestError::SessionNotFound(session_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::InProcessDispatch;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRunner {
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PipelineRun for CountingRunner {
        async fn run(&self, _payload: ProcessProjectPayload) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn coordinator(runs: Arc<AtomicUsize>) -> (IngestionCoordinator, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let sessions = Arc::new(SessionStore::new(dir.path()));
        let runner: Arc<dyn PipelineRun> = Arc::new(CountingRunner { runs });
        let coordinator = IngestionCoordinator::new(
            sessions,
            Arc::new(InProcessDispatch),
            runner,
            UploadConfig::default(),
        );
        (coordinator, dir)
    }

    #[tokio::test]
    async fn upload_project_creates_a_pending_or_further_session() {
        let runs = Arc::new(AtomicUsize::new(0));
        let (coordinator, _dir) = coordinator(runs.clone());
        let session = coordinator
            .upload_project("demo", "owner-1", vec![("a.py".to_string(), "x = 1\n".to_string())])
            .await
            .unwrap();
        assert_eq!(session.total_files, 1);
        tokio::task::yield_now().await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_project_name_is_rejected() {
        let runs = Arc::new(AtomicUsize::new(0));
        let (coordinator, _dir) = coordinator(runs);
        assert!(coordinator.upload_project("  ", "owner-1", vec![]).await.is_err());
    }

    #[tokio::test]
    async fn get_session_reports_unknown_ids() {
        let runs = Arc::new(AtomicUsize::new(0));
        let (coordinator, _dir) = coordinator(runs);
        assert!(coordinator.get_session("missing").await.is_err());
    }
}
