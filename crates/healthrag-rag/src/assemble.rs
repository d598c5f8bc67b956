//! Rerank retrieved candidates and cut them down to the prompt context.
use tracing::debug;

use healthrag_core::traits::Reranker;
use healthrag_core::types::{by_score_desc, Candidate, RankedCandidate};
use healthrag_core::{Cause, Error, Result};

pub const PASSAGE_SEPARATOR: &str = "\n\n";

/// The passages handed to the generator, best first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    pub passages: Vec<RankedCandidate>,
}

impl Context {
    pub fn is_empty(&self) -> bool { self.passages.is_empty() }

    pub fn len(&self) -> usize { self.passages.len() }

    pub fn text(&self) -> String {
        self.passages.iter().map(|p| p.document.text.as_str()).collect::<Vec<_>>().join(PASSAGE_SEPARATOR)
    }
}

/// Score all candidates in one batch and sort them by descending relevance.
/// Ties keep retrieval order; a NaN score ranks last.
pub fn rerank(reranker: &dyn Reranker, query: &str, candidates: Vec<Candidate>) -> Result<Vec<RankedCandidate>> {
    if candidates.is_empty() { return Ok(Vec::new()); }
    let texts: Vec<&str> = candidates.iter().map(|c| c.document.text.as_str()).collect();
    let scores = reranker.score_batch(query, &texts)?;
    if scores.len() != candidates.len() {
        return Err(Error::rerank(
            Cause::Permanent,
            format!("{} scores for {} candidates", scores.len(), candidates.len()),
        ));
    }
    let mut ranked: Vec<RankedCandidate> = candidates
        .into_iter()
        .zip(scores)
        .map(|(c, relevance_score)| RankedCandidate { document: c.document, relevance_score })
        .collect();
    ranked.sort_by(|a, b| by_score_desc(a.relevance_score, b.relevance_score));
    debug!(count = ranked.len(), best = ranked.first().map(|r| r.relevance_score), "reranked candidates");
    Ok(ranked)
}

pub fn truncate(mut ranked: Vec<RankedCandidate>, top_n: usize) -> Context {
    ranked.truncate(top_n);
    Context { passages: ranked }
}

pub fn assemble(reranker: &dyn Reranker, query: &str, candidates: Vec<Candidate>, top_n: usize) -> Result<Context> {
    Ok(truncate(rerank(reranker, query, candidates)?, top_n))
}
