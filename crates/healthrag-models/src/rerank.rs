//! Rerankers: the BGE cross-encoder and a lexical stand-in.

use anyhow::{Result, anyhow};
use candle_core::{DType, Device};
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaForSequenceClassification};
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use healthrag_core::traits::Reranker;
use healthrag_core::{Cause, Error};

use crate::device::select_device;
use crate::tokenize::{batch_on_device, load_tokenizer};
use crate::weights::{load_var_builder, read_model_info};

/// XLM-RoBERTa sequence classifier with a single relevance logit (bge-reranker).
pub struct CrossEncoderReranker {
    model: XLMRobertaForSequenceClassification,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
    pad_id: u32,
}

impl CrossEncoderReranker {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!(model_dir = %model_dir.display(), "loading reranker model");
        let model_info = read_model_info(model_dir)?;
        if model_info.model_type != "xlm-roberta" {
            return Err(anyhow!("Unsupported reranker model type '{}'", model_info.model_type));
        }
        let config: XLMRobertaConfig = serde_json::from_str(&model_info.raw)?;
        let tokenizer = load_tokenizer(model_dir, max_len)?;
        let vb = load_var_builder(model_dir, &device)?;
        let model = XLMRobertaForSequenceClassification::new(1, &config, vb)?;
        info!("reranker model loaded");
        Ok(Self { model, tokenizer, device, max_len, pad_id: model_info.pad_token_id })
    }

    fn logits(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>> {
        let pairs: Vec<(&str, &str)> = documents.iter().map(|d| (query, *d)).collect();
        let (input_ids, attention_mask) =
            batch_on_device(&self.tokenizer, pairs, self.max_len, self.pad_id, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let logits = self.model.forward(&input_ids, &attention_mask, &token_type_ids)?;
        let scores = logits.to_dtype(DType::F32)?.to_device(&Device::Cpu)?.flatten_all()?.to_vec1::<f32>()?;
        if scores.len() != documents.len() {
            return Err(anyhow!("Expected {} scores, got {}", documents.len(), scores.len()));
        }
        Ok(scores)
    }
}

impl Reranker for CrossEncoderReranker {
    fn score_batch(&self, query: &str, documents: &[&str]) -> healthrag_core::Result<Vec<f32>> {
        if documents.is_empty() { return Ok(Vec::new()); }
        let start = Instant::now();
        let scores = self
            .logits(query, documents)
            .map_err(|e| Error::rerank(Cause::Permanent, format!("{e:#}")))?;
        debug!(count = documents.len(), elapsed_ms = start.elapsed().as_millis() as u64, "reranked batch");
        Ok(scores)
    }
}

/// Fraction of distinct query terms that occur as whole words in the passage.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalReranker;

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl Reranker for LexicalReranker {
    fn score_batch(&self, query: &str, documents: &[&str]) -> healthrag_core::Result<Vec<f32>> {
        let query_terms = terms(query);
        if query_terms.is_empty() { return Ok(vec![0.0; documents.len()]); }
        Ok(documents
            .iter()
            .map(|doc| {
                let doc_terms = terms(doc);
                let hits = query_terms.iter().filter(|t| doc_terms.contains(*t)).count();
                hits as f32 / query_terms.len() as f32
            })
            .collect())
    }
}
