//! Bulk loading of articles into the vector index.
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::{info, warn};

use healthrag_core::articles::{Article, ArticleProcessor, ChunkingConfig};
use healthrag_core::traits::{Embedder, VectorIndex};
use healthrag_core::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub articles: usize,
    pub chunks: usize,
    pub indexed: usize,
    pub failed_batches: usize,
    /// Rows in the collection once ingestion finished.
    pub stored: usize,
}

pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    processor: ArticleProcessor,
    batch_size: usize,
    progress: bool,
}

impl Ingestor {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, chunking: ChunkingConfig, batch_size: usize) -> Result<Self> {
        let processor = ArticleProcessor::new(chunking)?;
        Ok(Self { embedder, index, processor, batch_size: batch_size.max(1), progress: false })
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.progress { return ProgressBar::hidden(); }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }

    /// Replace the collection with the chunks of `articles`.
    ///
    /// A batch the embedder rejects is logged and skipped; index errors abort.
    pub async fn ingest(&self, articles: &[Article]) -> Result<IngestReport> {
        let documents = self.processor.documents(articles);
        let mut report = IngestReport { articles: articles.len(), chunks: documents.len(), ..Default::default() };
        info!(articles = report.articles, chunks = report.chunks, "ingesting");

        self.index.reset().await?;

        let pb = self.progress_bar(documents.len());
        for (n, batch) in documents.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
            match self.embedder.embed_batch(&texts) {
                Ok(vectors) => {
                    self.index.upsert(batch, &vectors).await?;
                    report.indexed += batch.len();
                }
                Err(e) => {
                    warn!(batch = n, size = batch.len(), first_id = %batch[0].id, error = %e, "skipping batch");
                    report.failed_batches += 1;
                }
            }
            pb.inc(batch.len() as u64);
        }
        pb.finish_with_message("done");
        report.stored = self.index.count().await?;
        info!(indexed = report.indexed, stored = report.stored, failed_batches = report.failed_batches, "ingestion finished");
        Ok(report)
    }
}
