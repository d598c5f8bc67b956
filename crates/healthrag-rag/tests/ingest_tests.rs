use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use healthrag_core::articles::{Article, ChunkingConfig};
use healthrag_core::traits::{Embedder, VectorIndex};
use healthrag_core::types::Document;
use healthrag_core::{Cause, Error, Result};
use healthrag_models::HashEmbedder;
use healthrag_rag::Ingestor;
use healthrag_vector::MemoryIndex;

const DIM: usize = 32;

fn article(title: &str, text: &str) -> Article {
    Article {
        title: Some(title.to_string()),
        text: Some(text.to_string()),
        source_url: Some(format!("https://example.org/{title}")),
        keyword: None,
        mesh_query: Some(serde_json::json!("Preventive Medicine")),
    }
}

/// Fails every second call.
struct FlakyEmbedder {
    inner: HashEmbedder,
    calls: AtomicUsize,
}

impl Embedder for FlakyEmbedder {
    fn dim(&self) -> usize { self.inner.dim() }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
            return Err(Error::embedding(Cause::Permanent, "bad batch"));
        }
        self.inner.embed_batch(texts)
    }
}

#[tokio::test]
async fn ingest_replaces_collection() -> anyhow::Result<()> {
    let index = Arc::new(MemoryIndex::new(DIM));
    let stale = Document::new("stale", "old text");
    index.upsert(&[stale], &[HashEmbedder::new(DIM).embed("old text")?]).await?;

    let ingestor = Ingestor::new(Arc::new(HashEmbedder::new(DIM)), index.clone(), ChunkingConfig { size: 10, overlap: 2 }, 2)?;
    let articles = vec![article("a", "abcdefghijklmnopqrst"), article("empty", "   "), article("b", "short")];
    let report = ingestor.ingest(&articles).await?;

    assert_eq!(report.articles, 3);
    // "abcdefghijklmnopqrst": starts 0, 8, 16 -> 3 windows; "short" -> 1
    assert_eq!(report.chunks, 4);
    assert_eq!(report.indexed, 4);
    assert_eq!(report.failed_batches, 0);
    assert_eq!(report.stored, 4, "stale row is gone");
    assert_eq!(index.count().await?, 4);

    let hits = index.query(&HashEmbedder::new(DIM).embed("short")?, 1).await?;
    assert_eq!(hits[0].document.id, "pmc_3");
    assert_eq!(hits[0].document.metadata["keyword"], "Preventive Medicine");
    assert_eq!(hits[0].document.metadata["title"], "b");
    Ok(())
}

#[tokio::test]
async fn failed_embedding_batches_are_skipped() -> anyhow::Result<()> {
    let index = Arc::new(MemoryIndex::new(DIM));
    let embedder = Arc::new(FlakyEmbedder { inner: HashEmbedder::new(DIM), calls: AtomicUsize::new(0) });
    let ingestor = Ingestor::new(embedder, index.clone(), ChunkingConfig::default(), 1)?;
    let articles: Vec<Article> = (0..4).map(|i| article(&format!("t{i}"), &format!("text number {i}"))).collect();

    let report = ingestor.ingest(&articles).await?;
    assert_eq!(report.chunks, 4);
    assert_eq!(report.failed_batches, 2);
    assert_eq!(report.indexed, 2);
    assert_eq!(report.stored, 2);
    Ok(())
}

#[test]
fn overlapping_chunk_window_is_rejected() {
    let index = Arc::new(MemoryIndex::new(DIM));
    let result = Ingestor::new(Arc::new(HashEmbedder::new(DIM)), index, ChunkingConfig { size: 0, overlap: 0 }, 4);
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}
