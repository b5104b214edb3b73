#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use vesper_memory::db::vector::SqliteVecStore;
use vesper_memory::embedding::EmbeddingProvider;
use vesper_memory::memory::store::{MemoryStore, StoreOptions};

pub const DIMS: usize = 256;

/// Deterministic embedder: each word is hashed into one of `DIMS` buckets and
/// the counts are L2-normalized. Texts sharing words end up close together.
pub struct HashEmbedder;

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut v = vec![0.0f32; DIMS];
        for word in text.split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if word.is_empty() {
                continue;
            }
            let bucket = word
                .bytes()
                .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize))
                % DIMS;
            v[bucket] += 1.0;
        }
        Ok(vesper_memory::embedding::local::l2_normalize(&v))
    }

    fn dimensions(&self) -> usize {
        DIMS
    }

    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn model_name(&self) -> &str {
        "hash-embedder"
    }
}

/// A store over a fresh in-memory database.
pub fn memory_store(chunk_tokens: usize) -> MemoryStore {
    store_over(Arc::new(SqliteVecStore::in_memory().unwrap()), chunk_tokens)
}

/// A store over an existing vector store (to share one database between
/// several stores).
pub fn store_over(vectors: Arc<SqliteVecStore>, chunk_tokens: usize) -> MemoryStore {
    MemoryStore::new(
        Arc::new(HashEmbedder),
        vectors,
        StoreOptions {
            table: "memory".into(),
            chunk_tokens,
        },
    )
    .unwrap()
}

/// One export message node.
pub fn node(role: &str, create_time: f64, text: &str) -> Value {
    json!({
        "message": {
            "author": { "role": role },
            "create_time": create_time,
            "content": { "content_type": "text", "parts": [text] }
        }
    })
}

/// A conversation object with the given `(role, time, text)` messages.
pub fn conversation(title: &str, messages: &[(&str, f64, &str)]) -> Value {
    let mut mapping = serde_json::Map::new();
    mapping.insert("root".into(), json!({ "message": null, "children": [] }));
    for (i, (role, t, text)) in messages.iter().enumerate() {
        mapping.insert(format!("node-{i}"), node(role, *t, text));
    }
    json!({ "title": title, "mapping": mapping })
}

pub fn write_json(path: &Path, value: &Value) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
}
