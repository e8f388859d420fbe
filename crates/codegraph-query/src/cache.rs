//! In-process TTL cache keyed by the `query:<op>:project:<pid>:…` shape
//! (§4.7), reusing `codegraph_core::model::CacheEntry` rather than
//! introducing a second expiry representation. Grounded on
//! `cache_service.py::CacheService`, minus the Redis transport: the spec
//! names caching as part of the QueryEngine's own contract, not an
//! out-of-scope external collaborator, so this crate owns it directly.

use codegraph_core::model::CacheEntry;
use std::collections::HashMap;
use tokio::sync::RwLock;

pub struct QueryCache {
    default_ttl_seconds: u64,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl QueryCache {
    pub fn new(default_ttl_seconds: u64) -> Self {
        Self { default_ttl_seconds, entries: RwLock::new(HashMap::new()) }
    }

    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.is_expired(chrono::Utc::now()) {
            return None;
        }
        Some(entry.value.clone())
    }

    pub async fn set(&self, key: impl Into<String>, value: serde_json::Value) {
        let mut entries = self.entries.write().await;
        entries.insert(key.into(), CacheEntry::new(value, self.default_ttl_seconds));
    }

    /// Deletes every key containing `:project:<project_id>:`, the same
    /// glob `cache_service.py::invalidate_project` scans for. Best-effort:
    /// callers are expected to invoke this after any write to a project,
    /// not to rely on it for correctness.
    pub async fn invalidate_project(&self, project_id: &str) -> usize {
        let pattern = format!(":project:{project_id}:");
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.contains(&pattern));
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = QueryCache::new(300);
        cache.set("query:callers:project:P1:function:F1", serde_json::json!({"a": 1})).await;
        let value = cache.get("query:callers:project:P1:function:F1").await;
        assert_eq!(value, Some(serde_json::json!({"a": 1})));
    }

    #[tokio::test]
    async fn zero_ttl_entry_is_immediately_expired() {
        let cache = QueryCache::new(0);
        cache.set("query:callers:project:P1:function:F1", serde_json::json!(1)).await;
        assert!(cache.get("query:callers:project:P1:function:F1").await.is_none());
    }

    #[tokio::test]
    async fn invalidate_project_sweeps_only_matching_keys() {
        let cache = QueryCache::new(300);
        cache.set("query:callers:project:P1:function:F1", serde_json::json!(1)).await;
        cache.set("query:callers:project:P2:function:F1", serde_json::json!(1)).await;
        let deleted = cache.invalidate_project("P1").await;
        assert_eq!(deleted, 1);
        assert!(cache.get("query:callers:project:P1:function:F1").await.is_none());
        assert!(cache.get("query:callers:project:P2:function:F1").await.is_some());
    }
}
