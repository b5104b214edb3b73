//! Context-size estimate for serving a GGUF model from GPU memory.
//!
//! The KV cache grows linearly with context length; whatever VRAM is left after
//! the weights and a fixed overhead bounds how many tokens fit.

use std::path::Path;

use anyhow::{bail, Context, Result};

/// Fixed allowance for runtime buffers.
pub const OVERHEAD_BYTES: u64 = 500 * 1024 * 1024;
/// Share of VRAM the estimate may plan for.
pub const RESERVE_FRACTION: f64 = 0.95;
/// Bytes per KV element (f16 cache).
pub const KV_TYPE_SIZE: u64 = 2;
/// Smallest context ever suggested.
pub const MIN_CONTEXT: u64 = 2048;
/// Suggestions are multiples of this.
pub const CONTEXT_STEP: u64 = 256;

/// Attention geometry read off a model card or GGUF header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KvParams {
    pub layers: u64,
    pub embedding_length: u64,
    pub heads: u64,
    /// Equals `heads` for models without grouped-query attention.
    pub kv_heads: u64,
}

impl KvParams {
    /// KV cache bytes for one token: keys and values for every layer.
    pub fn bytes_per_token(&self) -> Result<f64> {
        if self.layers == 0 || self.heads == 0 || self.kv_heads == 0 || self.embedding_length == 0 {
            bail!("model parameters must all be non-zero: {self:?}");
        }
        let head_dim = self.embedding_length as f64 / self.heads as f64;
        let elements = 2.0 * self.layers as f64 * self.kv_heads as f64 * head_dim;
        Ok(elements * KV_TYPE_SIZE as f64)
    }
}

/// Largest context (in tokens) whose KV cache fits beside the model weights.
pub fn estimate_context(vram_bytes: u64, model_bytes: u64, params: &KvParams) -> Result<u64> {
    let available =
        vram_bytes as f64 * RESERVE_FRACTION - model_bytes as f64 - OVERHEAD_BYTES as f64;
    tracing::debug!(vram_bytes, model_bytes, available, "vram budget");
    if available <= 0.0 {
        tracing::warn!("model is larger than the usable VRAM, context will be minimal");
        return Ok(MIN_CONTEXT);
    }

    let per_token = params.bytes_per_token()?;
    let tokens = (available / per_token) as u64;
    let rounded = tokens / CONTEXT_STEP * CONTEXT_STEP;
    if rounded < MIN_CONTEXT {
        tracing::warn!(calculated = rounded, "calculated context is very low, using the minimum");
    }
    Ok(rounded.max(MIN_CONTEXT))
}

/// Split GGUF parts are named `<base>-NNNNN-of-NNNNN.gguf`. Returns `<base>`.
fn split_base(file_name: &str) -> Option<&str> {
    let stem = file_name.strip_suffix(".gguf")?;
    let (head, total) = stem.rsplit_once("-of-")?;
    let (base, index) = head.rsplit_once('-')?;
    let is_part = |s: &str| s.len() == 5 && s.bytes().all(|b| b.is_ascii_digit());
    (is_part(index) && is_part(total)).then_some(base)
}

/// Size of a model on disk. For a split model, the sum of every sibling part.
pub fn model_size(path: &Path) -> Result<u64> {
    let meta = std::fs::metadata(path)
        .with_context(|| format!("model file not found: {}", path.display()))?;
    if !meta.is_file() {
        bail!("model path is not a file: {}", path.display());
    }

    let Some(base) = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(split_base)
    else {
        return Ok(meta.len());
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
    let mut parts = 0usize;
    let mut total = 0u64;
    for entry in std::fs::read_dir(dir).with_context(|| format!("cannot list {}", dir.display()))? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if split_base(name) == Some(base) {
            parts += 1;
            total += entry.metadata()?.len();
        }
    }
    tracing::info!(parts, total_bytes = total, "detected split model");
    Ok(total)
}
