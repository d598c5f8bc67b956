use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use healthrag_core::traits::{Embedder, Generator, Reranker, VectorIndex};
use healthrag_core::types::{Candidate, Document, Query};
use healthrag_core::{Cause, Error, Result};
use healthrag_models::{HashEmbedder, LexicalReranker};
use healthrag_rag::RagPipeline;
use healthrag_vector::MemoryIndex;

const DIM: usize = 64;

/// Records every prompt and answers with a fixed string.
#[derive(Default)]
struct RecordingGenerator {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("resposta".to_string())
    }
}

struct DownGenerator;

#[async_trait]
impl Generator for DownGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(Error::generation(Cause::Transient, "connection refused"))
    }
}

struct BrokenIndex;

#[async_trait]
impl VectorIndex for BrokenIndex {
    async fn upsert(&self, _: &[Document], _: &[Vec<f32>]) -> Result<()> { Ok(()) }
    async fn query(&self, _: &[f32], _: usize) -> Result<Vec<Candidate>> {
        Err(Error::retrieval(Cause::Transient, "database unreachable"))
    }
    async fn reset(&self) -> Result<()> { Ok(()) }
    async fn count(&self) -> Result<usize> { Ok(0) }
}

/// Scores by the number at the end of the passage, e.g. "doc 4" -> 4.0.
struct TrailingNumberReranker;

impl Reranker for TrailingNumberReranker {
    fn score_batch(&self, _query: &str, documents: &[&str]) -> Result<Vec<f32>> {
        Ok(documents
            .iter()
            .map(|d| d.rsplit(' ').next().and_then(|n| n.parse().ok()).unwrap_or(0.0))
            .collect())
    }
}

async fn seeded_index(embedder: &dyn Embedder, texts: &[&str]) -> Arc<MemoryIndex> {
    let index = Arc::new(MemoryIndex::new(DIM));
    let docs: Vec<Document> = texts.iter().enumerate().map(|(i, t)| Document::new(format!("pmc_{i}"), *t)).collect();
    let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
    index.upsert(&docs, &embedder.embed_batch(&owned).unwrap()).await.unwrap();
    index
}

#[tokio::test]
async fn exercise_passage_outranks_car_engines() {
    let embedder = Arc::new(HashEmbedder::new(DIM));
    let index = seeded_index(
        embedder.as_ref(),
        &["Exercise reduces cardiovascular risk.", "Unrelated text about car engines."],
    )
    .await;
    let generator = Arc::new(RecordingGenerator::default());
    let pipeline = RagPipeline::new(embedder, index, Arc::new(LexicalReranker), generator.clone());

    let trace = pipeline.answer_traced(&Query::new("How does exercise affect heart health?")).await.unwrap();
    assert_eq!(trace.answer.text, "resposta");
    assert_eq!(trace.candidates.len(), 2);
    assert_eq!(trace.context.passages[0].document.text, "Exercise reduces cardiovascular risk.");
    assert!(trace.context.passages[0].relevance_score > trace.context.passages[1].relevance_score);

    let prompts = generator.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    let exercise_at = prompts[0].find("Exercise reduces").unwrap();
    let engines_at = prompts[0].find("car engines").unwrap();
    assert!(exercise_at < engines_at);
    assert!(prompts[0].contains("How does exercise affect heart health?"));
}

#[tokio::test]
async fn keeps_top_three_of_five_retrieved() {
    let embedder = Arc::new(HashEmbedder::new(DIM));
    let index = seeded_index(embedder.as_ref(), &["doc 2", "doc 5", "doc 1", "doc 4", "doc 3", "doc 0"]).await;
    let pipeline = RagPipeline::new(embedder, index, Arc::new(TrailingNumberReranker), Arc::new(RecordingGenerator::default()))
        .with_limits(5, 3)
        .unwrap();

    let trace = pipeline.answer_traced(&Query::new("doc")).await.unwrap();
    assert_eq!(trace.candidates.len(), 5);
    assert_eq!(trace.ranked.len(), 5, "every retrieved candidate keeps its score");
    assert!(trace.ranked.windows(2).all(|w| w[0].relevance_score >= w[1].relevance_score));
    assert_eq!(trace.context.passages[..], trace.ranked[..3]);
    assert_eq!(trace.context.len(), 3);
    let scores: Vec<f32> = trace.context.passages.iter().map(|p| p.relevance_score).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    // the three best of whichever five were retrieved
    let mut retrieved: Vec<f32> = trace
        .candidates
        .iter()
        .map(|c| c.document.text.rsplit(' ').next().unwrap().parse().unwrap())
        .collect();
    retrieved.sort_by(|a, b| b.total_cmp(a));
    assert_eq!(scores, retrieved[..3].to_vec());
}

#[test]
fn limits_must_keep_top_n_within_k() {
    let build = || {
        RagPipeline::new(
            Arc::new(HashEmbedder::new(DIM)),
            Arc::new(MemoryIndex::new(DIM)),
            Arc::new(LexicalReranker),
            Arc::new(RecordingGenerator::default()),
        )
    };
    assert!(matches!(build().with_limits(2, 3), Err(Error::InvalidConfig(_))));
    assert!(matches!(build().with_limits(5, 0), Err(Error::InvalidConfig(_))));
    let pipeline = build().with_limits(3, 3).unwrap();
    assert_eq!((pipeline.k(), pipeline.top_n()), (3, 3));
}

#[tokio::test]
async fn empty_index_still_calls_generator() {
    let generator = Arc::new(RecordingGenerator::default());
    let pipeline = RagPipeline::new(
        Arc::new(HashEmbedder::new(DIM)),
        Arc::new(MemoryIndex::new(DIM)),
        Arc::new(LexicalReranker),
        generator.clone(),
    );
    let answer = pipeline.answer(&Query::new("Qualquer pergunta?")).await.unwrap();
    assert_eq!(answer.text, "resposta");
    let prompts = generator.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(healthrag_rag::prompt::NO_CONTEXT));
    assert!(prompts[0].contains("Qualquer pergunta?"));
}

#[tokio::test]
async fn retrieval_failure_aborts_before_generation() {
    let generator = Arc::new(RecordingGenerator::default());
    let pipeline = RagPipeline::new(Arc::new(HashEmbedder::new(DIM)), Arc::new(BrokenIndex), Arc::new(LexicalReranker), generator.clone());
    let err = pipeline.answer(&Query::new("q")).await.unwrap_err();
    assert!(matches!(err, Error::Retrieval { cause: Cause::Transient, .. }));
    assert!(generator.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn generation_failure_is_surfaced() {
    let embedder = Arc::new(HashEmbedder::new(DIM));
    let index = seeded_index(embedder.as_ref(), &["Sleep matters."]).await;
    let pipeline = RagPipeline::new(embedder, index, Arc::new(LexicalReranker), Arc::new(DownGenerator));
    let err = pipeline.answer(&Query::new("sleep")).await.unwrap_err();
    assert!(matches!(err, Error::Generation { .. }));
    assert!(err.is_transient());
}
