//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait and a local ONNX Runtime
//! implementation for BERT-style sentence encoders (BGE by default). The
//! provider is created once per process via [`create_provider`] and shared.

pub mod local;

use anyhow::Result;

/// Trait for embedding text into vectors.
///
/// Implementations produce L2-normalized vectors of exactly [`dimensions`]
/// entries. All methods are synchronous; callers in async contexts should use
/// `tokio::task::spawn_blocking`.
///
/// [`dimensions`]: EmbeddingProvider::dimensions
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for batched inference.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Number of dimensions this provider produces.
    fn dimensions(&self) -> usize;

    /// Token length of `text` under this provider's tokenizer. Used for chunk
    /// budgeting, so it must not truncate.
    fn count_tokens(&self, text: &str) -> usize {
        estimate_tokens(text)
    }

    /// Identifier recorded alongside stored vectors.
    fn model_name(&self) -> &str;
}

/// Rough token count for providers without a tokenizer (~4 bytes per token).
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Create an embedding provider from config.
///
/// Currently only `"local"` is supported (ONNX Runtime + Hugging Face tokenizer).
/// Returns an error if model files are not found; run `vesper-memory model download` first.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => {
            let provider = local::LocalEmbeddingProvider::new(config)?;
            Ok(Box::new(provider))
        }
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local"),
    }
}

/// Directory holding `model.onnx` and `tokenizer.json` for `config.model`.
pub fn model_dir(config: &crate::config::EmbeddingConfig) -> std::path::PathBuf {
    let slug = config.model.replace('/', "--");
    crate::config::expand_tilde(&config.cache_dir).join(slug)
}
