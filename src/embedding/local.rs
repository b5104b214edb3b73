//! Local ONNX Runtime embedding provider.
//!
//! Implements [`EmbeddingProvider`] for BERT-style sentence encoders via `ort`.
//! Handles tokenization, inference, CLS or mean pooling, and L2 normalization.

use std::sync::Mutex;

use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;

/// Maximum sequence length fed to the encoder (BGE and MiniLM both accept 512).
const MAX_SEQ_LEN: usize = 512;

/// How token embeddings are reduced to one sentence vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pooling {
    /// First (`[CLS]`) token. BGE models are trained for this.
    Cls,
    /// Attention-masked mean over all tokens. MiniLM-style models.
    Mean,
}

impl std::str::FromStr for Pooling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cls" => Ok(Self::Cls),
            "mean" => Ok(Self::Mean),
            _ => Err(format!("unknown pooling: {s}")),
        }
    }
}

/// Local ONNX-based embedding provider.
pub struct LocalEmbeddingProvider {
    session: Mutex<Session>,
    /// Truncating, padding tokenizer for inference.
    tokenizer: Tokenizer,
    /// Untruncated copy used for token counting.
    counter: Tokenizer,
    pooling: Pooling,
    dimensions: usize,
    batch_size: usize,
    model: String,
}

// Safety: Tokenizer is Send+Sync. Session is behind a Mutex.
// The Mutex guarantees exclusive access during run().
unsafe impl Send for LocalEmbeddingProvider {}
unsafe impl Sync for LocalEmbeddingProvider {}

impl LocalEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let dir = super::model_dir(config);
        let model_path = dir.join("model.onnx");
        let tokenizer_path = dir.join("tokenizer.json");

        anyhow::ensure!(
            model_path.exists(),
            "ONNX model not found at {}. Run `vesper-memory model download` first.",
            model_path.display()
        );
        anyhow::ensure!(
            tokenizer_path.exists(),
            "Tokenizer not found at {}. Run `vesper-memory model download` first.",
            tokenizer_path.display()
        );

        let pooling: Pooling = config.pooling.parse().map_err(|e: String| anyhow::anyhow!(e))?;

        match config.device.as_str() {
            "auto" | "cpu" => {}
            "cuda" => tracing::warn!(
                "CUDA execution provider is not linked into this build; running on CPU"
            ),
            other => anyhow::bail!("unknown embedding device: {other}. Supported: auto, cpu, cuda"),
        }

        let threads = std::thread::available_parallelism()
            .map(|n| n.get().min(8))
            .unwrap_or(4);

        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads)?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;

        tracing::info!(model = %model_path.display(), threads, "ONNX model loaded");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;
        let counter = counting_tokenizer(tokenizer.clone())?;

        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to set truncation: {e}"))?;

        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        tracing::info!(tokenizer = %tokenizer_path.display(), ?pooling, "tokenizer loaded");

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            counter,
            pooling,
            dimensions: config.dimensions,
            batch_size: config.batch_size.max(1),
            model: config.model.clone(),
        })
    }

    fn run_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        // Step 1: Tokenize
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

        let batch_size = encodings.len();
        let seq_len = encodings[0].get_ids().len();

        // Step 2: Build flat input tensors as i64
        let mut input_ids_flat = Vec::with_capacity(batch_size * seq_len);
        let mut attention_mask_flat = Vec::with_capacity(batch_size * seq_len);

        for encoding in &encodings {
            input_ids_flat.extend(encoding.get_ids().iter().map(|&id| id as i64));
            attention_mask_flat.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
        }

        let shape = vec![batch_size as i64, seq_len as i64];
        let input_ids_tensor =
            Tensor::from_array((shape.clone(), input_ids_flat.into_boxed_slice()))?;
        let attention_mask_tensor =
            Tensor::from_array((shape.clone(), attention_mask_flat.clone().into_boxed_slice()))?;
        // token_type_ids: all zeros (single sentence, no segment B)
        let token_type_ids = vec![0i64; batch_size * seq_len];
        let token_type_ids_tensor =
            Tensor::from_array((shape, token_type_ids.into_boxed_slice()))?;

        // Step 3: Run ONNX inference
        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("session lock poisoned: {e}"))?;

        let outputs = session.run(ort::inputs! {
            "input_ids" => input_ids_tensor,
            "attention_mask" => attention_mask_tensor,
            "token_type_ids" => token_type_ids_tensor,
        })?;

        // Step 4: Extract token embeddings, shape [batch, seq_len, hidden]
        let token_emb_value = outputs
            .get("last_hidden_state")
            .or_else(|| outputs.get("token_embeddings"))
            .unwrap_or_else(|| &outputs[0]);

        let (shape, data) = token_emb_value
            .try_extract_tensor::<f32>()
            .context("failed to extract last_hidden_state tensor")?;

        let dims: &[i64] = &shape;
        anyhow::ensure!(
            dims.len() == 3 && dims[2] == self.dimensions as i64,
            "unexpected hidden state shape: {dims:?}, expected [batch, seq, {}]",
            self.dimensions
        );
        let hidden_dim = dims[2] as usize;
        let actual_seq_len = dims[1] as usize;

        // Step 5: Pool, then L2 normalize
        let mut results = Vec::with_capacity(batch_size);
        for b in 0..batch_size {
            let pooled = match self.pooling {
                Pooling::Cls => {
                    let offset = b * actual_seq_len * hidden_dim;
                    data[offset..offset + hidden_dim].to_vec()
                }
                Pooling::Mean => {
                    let mask = &attention_mask_flat[b * seq_len..(b + 1) * seq_len];
                    mean_pool(data, mask, b, actual_seq_len, hidden_dim)
                }
            };
            results.push(l2_normalize(&pooled));
        }

        Ok(results)
    }
}

impl EmbeddingProvider for LocalEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .context("embedding batch returned no vectors")
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(self.run_batch(batch)?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn count_tokens(&self, text: &str) -> usize {
        match self.counter.encode(text, true) {
            Ok(encoding) => encoding.get_ids().len(),
            Err(e) => {
                tracing::warn!(error = %e, "tokenizer failed, falling back to estimate");
                super::estimate_tokens(text)
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Attention-masked mean of one batch item's token embeddings.
fn mean_pool(data: &[f32], mask: &[i64], item: usize, seq_len: usize, hidden: usize) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden];
    let mut count = 0.0f32;

    for (s, &m) in mask.iter().enumerate().take(seq_len) {
        if m > 0 {
            let offset = (item * seq_len + s) * hidden;
            for (d, acc) in sum.iter_mut().enumerate() {
                *acc += data[offset + d];
            }
            count += 1.0;
        }
    }

    if count > 0.0 {
        sum.iter_mut().for_each(|x| *x /= count);
    }
    sum
}

/// L2-normalize a vector. Returns a zero vector if the input norm is zero.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

/// Strip whatever truncation and padding `tokenizer.json` ships with, so
/// token counts reflect the full text.
fn counting_tokenizer(mut tokenizer: Tokenizer) -> Result<Tokenizer> {
    tokenizer
        .with_truncation(None)
        .map_err(|e| anyhow::anyhow!("failed to clear truncation: {e}"))?;
    tokenizer.with_padding(None);
    Ok(tokenizer)
}
