//! Core configuration, loaded `defaults -> TOML file -> environment
//! variables`, matching the load order `rpg-core::config` documents.
//!
//! Field coverage follows spec.md §6 "Configuration" (abbreviated settings
//! list) and the original `config/settings.py`, which is the authoritative
//! source for field names and defaults not otherwise pinned by the spec.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub uri: String,
    pub username: String,
    pub password: String,
    pub pool_size: u32,
    pub timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: "local://./.codegraph/graphs".to_string(),
            username: String::new(),
            password: String::new(),
            pool_size: 10,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub host: String,
    pub port: u16,
    pub dimension: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            host: "local".to_string(),
            port: 0,
            dimension: 384,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub rate_per_minute: u32,
    pub dimension: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "BAAI/bge-small-en-v1.5".to_string(),
            rate_per_minute: 300,
            dimension: 384,
            batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_upload_files: usize,
    pub max_files_per_project: usize,
    pub max_file_size_mb: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_files: 500,
            max_files_per_project: 5_000,
            max_file_size_mb: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub cache_ttl_seconds: u64,
    pub default_search_top_k: usize,
    pub default_similarity_threshold: f32,
    pub default_token_budget: usize,
    pub query_timeout_seconds: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 300,
            default_search_top_k: 10,
            default_similarity_threshold: 0.5,
            default_token_budget: 4_000,
            query_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    pub view_mode: String,
    pub include_external: bool,
    pub include_isolated: bool,
    pub max_nodes: usize,
    pub max_edges: usize,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            view_mode: "symbol".to_string(),
            include_external: true,
            include_isolated: true,
            max_nodes: 500,
            max_edges: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub max_code_chars: usize,
    pub max_steps_cap: usize,
    pub max_timeout_ms: u64,
    pub default_max_steps: usize,
    pub default_timeout_ms: u64,
    pub execution_enabled: bool,
    pub execution_allow_in_production: bool,
    pub isolation_mode: String,
    pub import_whitelist: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_code_chars: 20_000,
            max_steps_cap: 10_000,
            max_timeout_ms: 10_000,
            default_max_steps: 1_000,
            default_timeout_ms: 3_000,
            execution_enabled: true,
            execution_allow_in_production: false,
            isolation_mode: "subprocess".to_string(),
            import_whitelist: vec![
                "math".to_string(),
                "itertools".to_string(),
                "functools".to_string(),
                "collections".to_string(),
                "statistics".to_string(),
                "random".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub url: Option<String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self { url: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CoreConfig {
    pub graph_store: StoreConfig,
    pub vector_store: VectorStoreConfig,
    pub embedding: EmbeddingConfig,
    pub upload: UploadConfig,
    pub query: QueryConfig,
    pub visualization: VisualizationConfig,
    pub analyzer: AnalyzerConfig,
    pub broker: BrokerConfig,
    /// Directory backing the local GraphStore/VectorStore/session adapters.
    pub data_dir: String,
}

impl CoreConfig {
    /// Load order: defaults -> `<project_root>/.codegraph/config.toml` (if
    /// present) -> environment variables with a `CODEGRAPH_` prefix.
    pub fn load(project_root: &Path) -> Result<Self> {
        let mut config = Self {
            data_dir: project_root.join(".codegraph").to_string_lossy().into_owned(),
            ..Self::default()
        };

        let config_path = project_root.join(".codegraph").join("config.toml");
        if config_path.exists() {
            let raw = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?;
            config = toml::from_str(&raw)
                .with_context(|| format!("failed to parse {}", config_path.display()))?;
        }

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        apply_env(&mut self.graph_store.uri, "CODEGRAPH_GRAPH_STORE_URI");
        apply_env_num(&mut self.graph_store.pool_size, "CODEGRAPH_GRAPH_STORE_POOL_SIZE");
        apply_env(&mut self.vector_store.host, "CODEGRAPH_VECTOR_STORE_HOST");
        apply_env_num(&mut self.vector_store.dimension, "CODEGRAPH_VECTOR_STORE_DIMENSION");
        apply_env(&mut self.embedding.model, "CODEGRAPH_EMBEDDING_MODEL");
        apply_env_num(&mut self.embedding.rate_per_minute, "CODEGRAPH_EMBEDDING_RATE_PER_MINUTE");
        apply_env_num(&mut self.upload.max_upload_files, "CODEGRAPH_MAX_UPLOAD_FILES");
        apply_env_num(&mut self.upload.max_files_per_project, "CODEGRAPH_MAX_FILES_PER_PROJECT");
        apply_env_num(&mut self.upload.max_file_size_mb, "CODEGRAPH_MAX_FILE_SIZE_MB");
        apply_env_num(&mut self.query.cache_ttl_seconds, "CODEGRAPH_CACHE_TTL_SECONDS");
        apply_env_bool(&mut self.analyzer.execution_enabled, "CODEGRAPH_EXECUTION_ENABLED");
        apply_env(&mut self.data_dir, "CODEGRAPH_DATA_DIR");
        if let Ok(url) = std::env::var("CODEGRAPH_BROKER_URL") {
            self.broker.url = Some(url);
        }
    }
}

fn apply_env(field: &mut String, key: &str) {
    if let Ok(value) = std::env::var(key) {
        *field = value;
    }
}

fn apply_env_bool(field: &mut bool, key: &str) {
    if let Ok(value) = std::env::var(key) {
        if let Ok(parsed) = value.parse() {
            *field = parsed;
        }
    }
}

fn apply_env_num<T: std::str::FromStr>(field: &mut T, key: &str) {
    if let Ok(value) = std::env::var(key) {
        if let Ok(parsed) = value.parse() {
            *field = parsed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = CoreConfig::default();
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.query.default_search_top_k, 10);
        assert!(config.analyzer.import_whitelist.contains(&"math".to_string()));
    }

    #[test]
    fn load_without_config_file_uses_defaults_plus_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = CoreConfig::load(dir.path()).unwrap();
        assert_eq!(config.upload.max_upload_files, 500);
        assert!(config.data_dir.ends_with(".codegraph"));
    }

    #[test]
    fn env_override_wins_over_file_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".codegraph")).unwrap();
        std::fs::write(
            dir.path().join(".codegraph/config.toml"),
            "[upload]\nmax_upload_files = 10\n",
        )
        .unwrap();
        unsafe {
            std::env::set_var("CODEGRAPH_MAX_UPLOAD_FILES", "99");
        }
        let config = CoreConfig::load(dir.path()).unwrap();
        unsafe {
            std::env::remove_var("CODEGRAPH_MAX_UPLOAD_FILES");
        }
        assert_eq!(config.upload.max_upload_files, 99);
    }
}
