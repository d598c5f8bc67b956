//! healthrag-models
//!
//! In-process models for the retrieval pipeline: the BGE sentence embedder,
//! the BGE cross-encoder reranker, and deterministic stand-ins used by tests
//! and offline development.

use anyhow::{Result, anyhow};
use std::sync::Arc;
use tracing::info;

use healthrag_core::config::{expand_path, EmbeddingBackend, EmbeddingSettings, RerankBackend, RerankSettings};
use healthrag_core::traits::{Embedder, Reranker};

pub mod device;
pub mod embed;
pub mod hash;
pub mod pool;
pub mod rerank;
pub mod tokenize;
pub mod weights;

pub use embed::{BgeEmbedder, Pooling};
pub use hash::HashEmbedder;
pub use pool::{cls_l2, masked_mean_l2};
pub use rerank::{CrossEncoderReranker, LexicalReranker};

fn env_flag(name: &str) -> bool {
    std::env::var(name).ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// Build the configured embedder. `APP_USE_FAKE_EMBEDDINGS=1` forces the hash embedder.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if env_flag("APP_USE_FAKE_EMBEDDINGS") || settings.backend == EmbeddingBackend::Hash {
        info!(dim = settings.dim, "using HashEmbedder");
        return Ok(Arc::new(HashEmbedder::new(settings.dim)));
    }
    let model_dir = expand_path(&settings.model_dir);
    if !model_dir.exists() {
        return Err(anyhow!("Could not locate embedding model directory {}", model_dir.display()));
    }
    Ok(Arc::new(BgeEmbedder::load(&model_dir, settings.max_len, settings.batch_size)?))
}

/// Build the configured reranker. `APP_USE_FAKE_RERANKER=1` forces the lexical reranker.
pub fn get_default_reranker(settings: &RerankSettings) -> Result<Arc<dyn Reranker>> {
    if env_flag("APP_USE_FAKE_RERANKER") || settings.backend == RerankBackend::Lexical {
        info!("using LexicalReranker");
        return Ok(Arc::new(LexicalReranker));
    }
    let model_dir = expand_path(&settings.model_dir);
    if !model_dir.exists() {
        return Err(anyhow!("Could not locate reranker model directory {}", model_dir.display()));
    }
    Ok(Arc::new(CrossEncoderReranker::load(&model_dir, settings.max_len)?))
}
