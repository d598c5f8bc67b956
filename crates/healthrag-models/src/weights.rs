use anyhow::{Context, Result, anyhow};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// The handful of `config.json` fields needed before picking a backbone.
pub struct ModelInfo {
    pub model_type: String,
    pub hidden_size: usize,
    pub pad_token_id: u32,
    pub raw: String,
}

pub fn read_model_info(model_dir: &Path) -> Result<ModelInfo> {
    let config_path = model_dir.join("config.json");
    let raw = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let model_type = value.get("model_type").and_then(|v| v.as_str()).unwrap_or("bert").to_string();
    let hidden_size = value
        .get("hidden_size")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| anyhow!("{} has no hidden_size", config_path.display()))? as usize;
    let pad_token_id = value.get("pad_token_id").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    Ok(ModelInfo { model_type, hidden_size, pad_token_id, raw })
}

/// Load `model.safetensors` if present, else the pickled `pytorch_model.bin`.
pub fn load_var_builder(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    let weights_map: HashMap<String, Tensor> = if safetensors.exists() {
        info!(path = %safetensors.display(), "loading model weights");
        candle_core::safetensors::load(&safetensors, device)?
    } else {
        let weights_path = model_dir.join("pytorch_model.bin");
        info!(path = %weights_path.display(), "loading model weights");
        candle_core::pickle::read_all(&weights_path)
            .with_context(|| format!("Failed to read {}", weights_path.display()))?
            .into_iter()
            .collect()
    };
    Ok(VarBuilder::from_tensors(weights_map, DType::F32, device))
}
