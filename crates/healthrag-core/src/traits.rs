use async_trait::async_trait;

use crate::error::{Cause, Error, Result};
use crate::types::{Candidate, Document};

/// Maps text to unit-length vectors of a fixed dimension.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self.embed_batch(&[text.to_string()])?;
        out.pop().ok_or_else(|| Error::embedding(Cause::Permanent, "embedder returned no vector"))
    }
}

/// Scores (query, passage) pairs. Higher is more relevant.
pub trait Reranker: Send + Sync {
    fn score_batch(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>>;

    fn score(&self, query: &str, document: &str) -> Result<f32> {
        let mut out = self.score_batch(query, &[document])?;
        out.pop().ok_or_else(|| Error::rerank(Cause::Permanent, "reranker returned no score"))
    }
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite documents by id. `vectors[i]` belongs to `documents[i]`.
    async fn upsert(&self, documents: &[Document], vectors: &[Vec<f32>]) -> Result<()>;
    /// Nearest neighbours by descending similarity, at most `k`.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Candidate>>;
    /// Drop and recreate the collection.
    async fn reset(&self) -> Result<()>;
    async fn count(&self) -> Result<usize>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}
