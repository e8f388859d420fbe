//! Session persistence: one JSON file per session under a sessions
//! directory, written atomically on every transition (§4.6, §6).
//!
//! Same rename-on-write idiom as `codegraph_core::local::graph` and, before
//! it, `rpg-core::storage::save`.

use crate::error::{CoreError, CoreResult};
use crate::model::Session;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

pub struct SessionStore {
    dir: PathBuf,
    lock: RwLock<()>,
}

impl SessionStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: data_dir.as_ref().join("sessions"),
            lock: RwLock::new(()),
        }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }

    pub async fn save(&self, session: &Session) -> CoreResult<()> {
        let _guard = self.lock.write().await;
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| CoreError::Internal(format!("creating sessions dir: {e}")))?;
        let path = self.path_for(&session.session_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(session)
            .map_err(|e| CoreError::Internal(format!("serializing session: {e}")))?;
        std::fs::write(&tmp, json).map_err(|e| CoreError::Internal(format!("writing {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &path).map_err(|e| CoreError::Internal(format!("renaming {}: {e}", tmp.display())))?;
        Ok(())
    }

    pub async fn load(&self, session_id: &str) -> CoreResult<Option<Session>> {
        let _guard = self.lock.read().await;
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| CoreError::Internal(format!("reading {}: {e}", path.display())))?;
        let session = serde_json::from_str(&raw)
            .map_err(|e| CoreError::Internal(format!("parsing {}: {e}", path.display())))?;
        Ok(Some(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let session = Session::new("s1", "p1", 3);
        store.save(&session).await.unwrap();
        let loaded = store.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded.session_id, "s1");
        assert_eq!(loaded.total_files, 3);
    }

    #[tokio::test]
    async fn load_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.load("missing").await.unwrap().is_none());
    }
}
