//! Persistent conversational memory for a locally-run language model.
//!
//! Vesper ingests a chat-history export, packs the messages into token-bounded
//! chunks, embeds each chunk, and serves nearest-neighbor lookups over the
//! result through a small authenticated HTTP API. The same memory can be
//! prepended to prompts sent to a local generation server.
//!
//! # Architecture
//!
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   `vec0` tables for vector search
//! - **Embeddings**: local ONNX Runtime, `BAAI/bge-large-en-v1.5` by default
//! - **Serving**: axum, `GET /`, `GET /lookup`, `POST /add`
//!
//! # Modules
//!
//! - [`config`]: configuration from TOML and `VESPER_*` environment variables
//! - [`db`]: SQLite bootstrap and the [`VectorStore`](db::vector::VectorStore) capability
//! - [`embedding`]: text-to-vector pipeline
//! - [`memory`]: export extraction, chunking, and the [`MemoryStore`](memory::store::MemoryStore)
//! - [`api`]: HTTP handlers and token check
//! - [`server`]: startup sequence (unzip, build, serve)
//! - [`generation`]: prompt assembly and the generation client
//! - [`context_size`]: context-length estimate for GGUF models

pub mod api;
pub mod cli;
pub mod config;
pub mod context_size;
pub mod db;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod memory;
pub mod server;
