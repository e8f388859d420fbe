//! Loads the local fastembed model backing the client. Same model and cache
//! layout as `rpg_nav::embeddings::init_model` (BGE-small-en-v1.5, cached
//! under a `models/` subdirectory so repeated runs skip the download).

use crate::error::EmbeddingError;
use fastembed::{EmbeddingModel, TextEmbedding, TextInitOptions};
use std::path::Path;

pub fn load_model(model_name: &str, cache_dir: &Path) -> Result<TextEmbedding, EmbeddingError> {
    let model = resolve_model(model_name)?;
    std::fs::create_dir_all(cache_dir).map_err(|e| EmbeddingError::ModelInit(e.to_string()))?;
    let options = TextInitOptions::new(model)
        .with_show_download_progress(false)
        .with_cache_dir(cache_dir.to_path_buf());
    TextEmbedding::try_new(options).map_err(|e| EmbeddingError::ModelInit(e.to_string()))
}

fn resolve_model(name: &str) -> Result<EmbeddingModel, EmbeddingError> {
    match name {
        "BAAI/bge-small-en-v1.5" | "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        other => Err(EmbeddingError::Configuration(format!("unsupported embedding model: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_model_name_is_a_configuration_error() {
        let err = resolve_model("not-a-real-model").unwrap_err();
        assert!(matches!(err, EmbeddingError::Configuration(_)));
    }

    #[test]
    fn known_model_aliases_resolve() {
        assert!(resolve_model("BAAI/bge-small-en-v1.5").is_ok());
        assert!(resolve_model("bge-small-en-v1.5").is_ok());
    }
}
