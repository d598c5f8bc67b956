//! Query-time orchestration: embed, retrieve, rerank, assemble, generate.
//!
//! Stages run strictly in order. The first failing stage aborts the request
//! with that stage's error; nothing is retried and no partial answer is
//! returned. An empty retrieval still reaches the generator.
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use healthrag_core::config::Settings;
use healthrag_core::traits::{Embedder, Generator, Reranker, VectorIndex};
use healthrag_core::types::{Answer, Candidate, Query, RankedCandidate};
use healthrag_core::{Error, Result};

use crate::assemble::{rerank, truncate, Context};
use crate::prompt::PromptTemplate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ReceivedQuery,
    Embedded,
    Retrieved,
    Reranked,
    ContextAssembled,
    Answered,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::ReceivedQuery => "received_query",
            Stage::Embedded => "embedded",
            Stage::Retrieved => "retrieved",
            Stage::Reranked => "reranked",
            Stage::ContextAssembled => "context_assembled",
            Stage::Answered => "answered",
        };
        f.write_str(s)
    }
}

/// Everything produced while answering one query.
#[derive(Debug, Clone)]
pub struct AnswerTrace {
    pub answer: Answer,
    /// Retrieval output in index order.
    pub candidates: Vec<Candidate>,
    /// Every candidate with its rerank score, best first.
    pub ranked: Vec<RankedCandidate>,
    pub context: Context,
    pub prompt: String,
}

pub struct RagPipeline {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    reranker: Arc<dyn Reranker>,
    generator: Arc<dyn Generator>,
    prompt: PromptTemplate,
    k: usize,
    top_n: usize,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        reranker: Arc<dyn Reranker>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self { embedder, index, reranker, generator, prompt: PromptTemplate::default(), k: 5, top_n: 3 }
    }

    /// Retrieve `k` candidates and keep the best `top_n`. Requires `k >= top_n >= 1`.
    pub fn with_limits(mut self, k: usize, top_n: usize) -> Result<Self> {
        if top_n == 0 || k < top_n {
            return Err(Error::InvalidConfig(format!("need k >= top_n >= 1, got k = {k}, top_n = {top_n}")));
        }
        self.k = k;
        self.top_n = top_n;
        Ok(self)
    }

    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    /// Apply retrieval limits and prompt template from settings.
    pub fn configured(self, settings: &Settings) -> Result<Self> {
        let prompt = PromptTemplate::from_settings(settings.prompt.template.as_deref())?;
        Ok(self.with_limits(settings.retrieval.k, settings.retrieval.top_n)?.with_prompt(prompt))
    }

    pub fn k(&self) -> usize { self.k }

    pub fn top_n(&self) -> usize { self.top_n }

    pub async fn answer(&self, query: &Query) -> Result<Answer> {
        Ok(self.answer_traced(query).await?.answer)
    }

    pub async fn answer_traced(&self, query: &Query) -> Result<AnswerTrace> {
        let start = Instant::now();
        debug!(stage = %Stage::ReceivedQuery, chars = query.text.chars().count());

        let vector = self.embedder.embed(&query.text).inspect_err(|e| warn!(stage = %Stage::Embedded, error = %e))?;
        debug!(stage = %Stage::Embedded, dim = vector.len());

        let candidates = self.index.query(&vector, self.k).await.inspect_err(|e| warn!(stage = %Stage::Retrieved, error = %e))?;
        debug!(stage = %Stage::Retrieved, count = candidates.len());

        let ranked = rerank(self.reranker.as_ref(), &query.text, candidates.clone())
            .inspect_err(|e| warn!(stage = %Stage::Reranked, error = %e))?;
        debug!(stage = %Stage::Reranked, count = ranked.len());

        let context = truncate(ranked.clone(), self.top_n);
        let prompt = self.prompt.render(&context, &query.text);
        debug!(stage = %Stage::ContextAssembled, passages = context.len(), prompt_chars = prompt.chars().count());

        let text = self.generator.generate(&prompt).await.inspect_err(|e| warn!(stage = %Stage::Answered, error = %e))?;
        info!(
            stage = %Stage::Answered,
            retrieved = candidates.len(),
            passages = context.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "answered query"
        );
        Ok(AnswerTrace { answer: Answer { text }, candidates, ranked, context, prompt })
    }
}
