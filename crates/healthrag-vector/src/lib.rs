//! healthrag-vector
//!
//! Vector index backends behind [`VectorIndex`]: an embedded LanceDB table,
//! a Chroma server, and an in-memory store for tests.

use std::sync::Arc;

use healthrag_core::config::{expand_path, IndexBackend, IndexSettings};
use healthrag_core::traits::VectorIndex;
use healthrag_core::types::Document;
use healthrag_core::{Cause, Error, Result};

pub mod chroma;
pub mod http;
pub mod lance;
pub mod memory;
pub mod schema;

pub use chroma::ChromaIndex;
pub use http::http_cause;
pub use lance::LanceIndex;
pub use memory::MemoryIndex;

/// Shared precondition for every backend's `upsert`.
pub(crate) fn check_upsert(documents: &[Document], embeddings: &[Vec<f32>], dim: usize) -> Result<()> {
    if documents.len() != embeddings.len() {
        return Err(Error::retrieval(
            Cause::Permanent,
            format!("{} documents but {} embeddings", documents.len(), embeddings.len()),
        ));
    }
    if let Some((doc, v)) = documents.iter().zip(embeddings).find(|(_, v)| v.len() != dim) {
        return Err(Error::retrieval(
            Cause::Permanent,
            format!("embedding for {} has dim {}, index expects {}", doc.id, v.len(), dim),
        ));
    }
    Ok(())
}

/// Open the configured index for vectors of width `dim`.
pub async fn open_index(settings: &IndexSettings, dim: usize) -> Result<Arc<dyn VectorIndex>> {
    match settings.backend {
        IndexBackend::Lance => {
            let dir = expand_path(&settings.lance_dir);
            std::fs::create_dir_all(&dir)?;
            let index = LanceIndex::open(&dir.to_string_lossy(), &settings.collection, dim).await?;
            Ok(Arc::new(index))
        }
        IndexBackend::Chroma => {
            let index = ChromaIndex::new(&settings.chroma_url, &settings.chroma_tenant, &settings.chroma_database, &settings.collection, dim)?;
            index.heartbeat().await?;
            Ok(Arc::new(index))
        }
        IndexBackend::Memory => Ok(Arc::new(MemoryIndex::new(dim))),
    }
}
