use anyhow::{Result, anyhow};
use candle_core::{Device, Tensor};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use candle_transformers::models::xlm_roberta::{XLMRobertaModel, Config as XLMRobertaConfig};
use std::path::Path;
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use healthrag_core::traits::Embedder;
use healthrag_core::{Cause, Error};

use crate::device::select_device;
use crate::pool::{cls_l2, masked_mean_l2};
use crate::tokenize::{batch_on_device, load_tokenizer};
use crate::weights::{load_var_builder, read_model_info};

enum Backbone {
    Bert(BertModel),
    XlmRoberta(XLMRobertaModel),
}

impl Backbone {
    fn forward(&self, input_ids: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
        let token_type_ids = input_ids.zeros_like()?;
        match self {
            Backbone::Bert(m) => m.forward(input_ids, &token_type_ids, Some(attention_mask)),
            Backbone::XlmRoberta(m) => m.forward(input_ids, attention_mask, &token_type_ids, None, None, None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pooling {
    Cls,
    Mean,
}

/// BGE-family sentence encoder (BERT or XLM-RoBERTa backbone) run in-process.
pub struct BgeEmbedder {
    backbone: Backbone,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    pad_id: u32,
    pooling: Pooling,
    batch_size: usize,
}

impl BgeEmbedder {
    pub fn load(model_dir: &Path, max_len: usize, batch_size: usize) -> Result<Self> {
        let device = select_device();
        info!(model_dir = %model_dir.display(), "loading embedding model");
        let model_info = read_model_info(model_dir)?;
        let tokenizer = load_tokenizer(model_dir, max_len)?;
        let vb = load_var_builder(model_dir, &device)?;
        let backbone = match model_info.model_type.as_str() {
            "bert" => {
                let config: BertConfig = serde_json::from_str(&model_info.raw)?;
                Backbone::Bert(BertModel::load(vb, &config)?)
            }
            "xlm-roberta" => {
                let config: XLMRobertaConfig = serde_json::from_str(&model_info.raw)?;
                Backbone::XlmRoberta(XLMRobertaModel::new(&config, vb)?)
            }
            other => return Err(anyhow!("Unsupported embedding model type '{}'", other)),
        };
        let pooling = read_pooling(model_dir);
        info!(dim = model_info.hidden_size, ?pooling, "embedding model loaded");
        Ok(Self {
            backbone,
            tokenizer,
            device,
            dim: model_info.hidden_size,
            max_len,
            pad_id: model_info.pad_token_id,
            pooling,
            batch_size: batch_size.max(1),
        })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let (input_ids, attention_mask) =
            batch_on_device(&self.tokenizer, inputs, self.max_len, self.pad_id, &self.device)?;
        let hidden = self.backbone.forward(&input_ids, &attention_mask)?;
        let pooled = match self.pooling {
            Pooling::Cls => cls_l2(&hidden)?,
            Pooling::Mean => masked_mean_l2(&hidden, &attention_mask)?,
        };
        let vectors: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        if let Some(v) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(anyhow!("Expected embedding dim {}, got {}", self.dim, v.len()));
        }
        Ok(vectors)
    }
}

/// sentence-transformers keeps the pooling mode in `1_Pooling/config.json`.
/// Without a readable one, mean pooling is used.
pub(crate) fn read_pooling(model_dir: &Path) -> Pooling {
    let path = model_dir.join("1_Pooling").join("config.json");
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "no pooling config; falling back to mean pooling");
            return Pooling::Mean;
        }
    };
    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(v) if v.get("pooling_mode_cls_token").and_then(|b| b.as_bool()) == Some(true) => Pooling::Cls,
        Ok(_) => Pooling::Mean,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable pooling config; falling back to mean pooling");
            Pooling::Mean
        }
    }
}

impl Embedder for BgeEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> healthrag_core::Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            let vectors = self
                .embed_chunk(chunk)
                .map_err(|e| Error::embedding(Cause::Permanent, format!("{e:#}")))?;
            out.extend(vectors);
        }
        let elapsed_ms = start.elapsed().as_millis();
        debug!(count = texts.len(), elapsed_ms, "embedded batch");
        if texts.len() == 1 && elapsed_ms > 100 { warn!(elapsed_ms, "slow embedding"); }
        Ok(out)
    }
}
