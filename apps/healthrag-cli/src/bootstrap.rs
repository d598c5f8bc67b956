//! Build the pipeline components once at startup.
use anyhow::{Context as _, Result};
use std::sync::Arc;
use tracing::{info, warn};

use healthrag_core::articles::ChunkingConfig;
use healthrag_core::config::{Config, Settings};
use healthrag_core::traits::{Embedder, VectorIndex};
use healthrag_models::{get_default_embedder, get_default_reranker};
use healthrag_rag::{Ingestor, OllamaGenerator, RagPipeline};
use healthrag_vector::open_index;

pub fn load_settings() -> Result<Settings> {
    let config = Config::load().context("loading configuration")?;
    let settings = config.settings()?;
    info!(env = config.env_name(), index = ?settings.index.backend, embedding = ?settings.embedding.backend, "configuration loaded");
    Ok(settings)
}

async fn retrieval_parts(settings: &Settings) -> Result<(Arc<dyn Embedder>, Arc<dyn VectorIndex>)> {
    let embedder = get_default_embedder(&settings.embedding)?;
    if embedder.dim() != settings.embedding.dim {
        warn!(configured = settings.embedding.dim, actual = embedder.dim(), "embedding.dim differs from the model; using the model's");
    }
    let index = open_index(&settings.index, embedder.dim()).await?;
    Ok((embedder, index))
}

pub async fn build_pipeline(settings: &Settings) -> Result<RagPipeline> {
    let (embedder, index) = retrieval_parts(settings).await?;
    let reranker = get_default_reranker(&settings.rerank)?;
    let generator = Arc::new(OllamaGenerator::new(&settings.llm)?);
    match index.count().await {
        Ok(0) => warn!(collection = %settings.index.collection, "collection is empty; run healthrag-ingest first"),
        Ok(n) => info!(collection = %settings.index.collection, documents = n, "collection opened"),
        Err(e) => warn!(error = %e, "could not count collection"),
    }
    let pipeline = RagPipeline::new(embedder, index, reranker, generator).configured(settings)?;
    info!(k = pipeline.k(), top_n = pipeline.top_n(), "pipeline ready");
    Ok(pipeline)
}

pub async fn build_ingestor(settings: &Settings) -> Result<Ingestor> {
    let (embedder, index) = retrieval_parts(settings).await?;
    let chunking = ChunkingConfig { size: settings.ingest.chunk_size, overlap: settings.ingest.chunk_overlap };
    Ok(Ingestor::new(embedder, index, chunking, settings.ingest.batch_size)?)
}
