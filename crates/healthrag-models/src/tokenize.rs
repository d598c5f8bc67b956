use anyhow::{Result, anyhow};
use candle_core::{Device, Tensor};
use std::path::Path;
use tokenizers::{EncodeInput, Tokenizer, TruncationParams};

/// Load `tokenizer.json` with truncation at `max_len`; padding is applied by [`batch_on_device`].
pub fn load_tokenizer(model_dir: &Path, max_len: usize) -> Result<Tokenizer> {
    let path = model_dir.join("tokenizer.json");
    let mut tokenizer = Tokenizer::from_file(&path)
        .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", path.display(), e))?;
    tokenizer.with_padding(None);
    tokenizer
        .with_truncation(Some(TruncationParams { max_length: max_len, ..Default::default() }))
        .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;
    Ok(tokenizer)
}

/// Encode a batch of single texts or (query, passage) pairs into `[B, max_len]`
/// id and mask tensors, right-padded with `pad_id`.
pub fn batch_on_device<'s, E>(
    tokenizer: &Tokenizer,
    inputs: Vec<E>,
    max_len: usize,
    pad_id: u32,
    device: &Device,
) -> Result<(Tensor, Tensor)>
where
    E: Into<EncodeInput<'s>>,
{
    let batch = inputs.len();
    let mut all_ids = Vec::with_capacity(batch * max_len);
    let mut all_mask = Vec::with_capacity(batch * max_len);
    for input in inputs {
        let enc = tokenizer.encode(input, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let mut ids = enc.get_ids().to_vec();
        let mut mask = enc.get_attention_mask().to_vec();
        if ids.len() > max_len { ids.truncate(max_len); mask.truncate(max_len); }
        if ids.len() < max_len {
            let pad = max_len - ids.len();
            ids.extend(std::iter::repeat(pad_id).take(pad));
            mask.extend(std::iter::repeat(0).take(pad));
        }
        all_ids.extend(ids);
        all_mask.extend(mask);
    }
    let input_ids = Tensor::from_vec(all_ids, (batch, max_len), device)?;
    let attention_mask = Tensor::from_vec(all_mask, (batch, max_len), device)?;
    Ok((input_ids, attention_mask))
}
