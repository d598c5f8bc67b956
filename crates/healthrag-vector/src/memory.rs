use async_trait::async_trait;
use std::sync::RwLock;

use healthrag_core::traits::VectorIndex;
use healthrag_core::types::{by_score_desc, Candidate, Document};
use healthrag_core::{Cause, Error, Result};

use crate::check_upsert;

/// Brute-force in-process index. Similarity is the dot product, which equals
/// cosine similarity for the L2-normalised vectors the embedders produce.
pub struct MemoryIndex {
    dim: usize,
    rows: RwLock<Vec<(Document, Vec<f32>)>>,
}

impl MemoryIndex {
    pub fn new(dim: usize) -> Self { Self { dim, rows: RwLock::new(Vec::new()) } }
}

fn poisoned<T>(_: T) -> Error { Error::retrieval(Cause::Permanent, "memory index lock poisoned") }

fn dot(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, documents: &[Document], embeddings: &[Vec<f32>]) -> Result<()> {
        check_upsert(documents, embeddings, self.dim)?;
        let mut rows = self.rows.write().map_err(poisoned)?;
        for (doc, vector) in documents.iter().zip(embeddings) {
            match rows.iter_mut().find(|(d, _)| d.id == doc.id) {
                Some(row) => *row = (doc.clone(), vector.clone()),
                None => rows.push((doc.clone(), vector.clone())),
            }
        }
        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<Candidate>> {
        if embedding.len() != self.dim {
            return Err(Error::retrieval(Cause::Permanent, format!("query vector has dim {}, index expects {}", embedding.len(), self.dim)));
        }
        let rows = self.rows.read().map_err(poisoned)?;
        let mut hits: Vec<Candidate> = rows
            .iter()
            .map(|(doc, v)| Candidate { document: doc.clone(), similarity_score: dot(embedding, v) })
            .collect();
        hits.sort_by(|a, b| by_score_desc(a.similarity_score, b.similarity_score));
        hits.truncate(k);
        Ok(hits)
    }

    async fn reset(&self) -> Result<()> {
        self.rows.write().map_err(poisoned)?.clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.rows.read().map_err(poisoned)?.len())
    }
}
