//! Memory store: owns the embedding provider and the vector-store handle and
//! implements build, add, and search over the single memory table.
//!
//! Lifecycle: constructed once at startup (provider loaded, store opened),
//! then either attached to an existing table or waiting for [`MemoryStore::build`].
//! A table that exists with zero rows is treated as a crashed build and is
//! rebuilt from scratch.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::db::vector::{VectorRow, VectorStore};
use crate::embedding::EmbeddingProvider;
use crate::error::{MemoryError, MemoryResult};
use crate::memory::chunk::chunk_messages;
use crate::memory::extract::extract;
use crate::memory::types::{
    AddOutcome, BuildOutcome, Chunk, Message, NewMessage, Role, SearchHit,
};

/// Upper bound on results per search.
pub const MAX_K: usize = 20;

/// Text stored when an export contains no messages, so the table still gets a schema.
pub const PLACEHOLDER_TEXT: &str =
    "[SYSTEM] (1970-01-01T00:00:00+00:00): memory initialized with no prior conversations";

/// Clamp a requested result count into `[1, MAX_K]`.
pub fn clamp_k(k: usize) -> usize {
    k.clamp(1, MAX_K)
}

/// Tunables taken from config at construction.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub table: String,
    pub chunk_tokens: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            table: "memory".into(),
            chunk_tokens: 5500,
        }
    }
}

pub struct MemoryStore {
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: Arc<dyn VectorStore>,
    options: StoreOptions,
    /// Set once the table is known to exist; lets search skip the lookup.
    attached: AtomicBool,
}

impl MemoryStore {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStore>,
        options: StoreOptions,
    ) -> MemoryResult<Self> {
        let store = Self {
            embedder,
            vectors,
            options,
            attached: AtomicBool::new(false),
        };
        if store.try_attach()? {
            tracing::info!(table = %store.options.table, "attached to existing memory table");
        } else {
            tracing::info!(table = %store.options.table, "memory table not found; it will be created on build");
        }
        Ok(store)
    }

    pub fn table(&self) -> &str {
        &self.options.table
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// True when the store is attached to an existing table.
    pub fn is_ready(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Reattach if the table appeared since the last check (e.g. built by
    /// another process). Returns the refreshed readiness.
    pub fn try_attach(&self) -> MemoryResult<bool> {
        if self.is_ready() {
            return Ok(true);
        }
        let found = self.vectors.open(&self.options.table)?.is_some();
        if found {
            self.attached.store(true, Ordering::Release);
        }
        Ok(found)
    }

    /// The table exists and holds at least one entry.
    pub fn is_built(&self) -> MemoryResult<bool> {
        Ok(self.vectors.exists(&self.options.table)? && self.entry_count()? > 0)
    }

    pub fn entry_count(&self) -> MemoryResult<u64> {
        Ok(self.vectors.count(&self.options.table)?)
    }

    /// First-time ingestion of the export under `source`.
    ///
    /// Skips when already built. Must not run concurrently with itself; the
    /// server only calls it from the startup sequence.
    pub fn build(&self, source: &Path) -> MemoryResult<BuildOutcome> {
        if self.is_built()? {
            let entries = self.entry_count()?;
            self.attached.store(true, Ordering::Release);
            tracing::info!(entries, "memory already built, skipping");
            return Ok(BuildOutcome::AlreadyBuilt { entries });
        }

        let messages = extract(source)?;
        self.build_from_messages(&messages)
    }

    /// Build from already-extracted messages. Same skip and self-heal rules as
    /// [`build`](Self::build).
    pub fn build_from_messages(&self, messages: &[Message]) -> MemoryResult<BuildOutcome> {
        if self.is_built()? {
            let entries = self.entry_count()?;
            self.attached.store(true, Ordering::Release);
            return Ok(BuildOutcome::AlreadyBuilt { entries });
        }

        let table = &self.options.table;
        let healed = self.vectors.exists(table)?;
        if healed {
            tracing::warn!(table = %table, "memory table exists but is empty, dropping it");
            self.attached.store(false, Ordering::Release);
            self.vectors.drop_table(table)?;
        }

        let placeholder = messages.is_empty();
        let chunks = if placeholder {
            tracing::warn!("export contained no messages, writing a placeholder entry");
            vec![Chunk {
                text: PLACEHOLDER_TEXT.to_string(),
                span: 0..0,
                tokens: 0,
            }]
        } else {
            self.chunk(messages)
        };

        tracing::info!(chunks = chunks.len(), "computing embeddings");
        let rows = self.embed_chunks(&chunks)?;
        self.vectors.create(table, &rows)?;
        self.attached.store(true, Ordering::Release);

        tracing::info!(messages = messages.len(), chunks = chunks.len(), "memory build complete");
        Ok(BuildOutcome::Built {
            messages: messages.len(),
            chunks: chunks.len(),
            placeholder,
            healed,
        })
    }

    /// Append new messages as fresh entries. Never replaces existing ones.
    pub fn add(&self, new_messages: Vec<NewMessage>) -> MemoryResult<AddOutcome> {
        if new_messages.is_empty() {
            return Err(MemoryError::InvalidArgument(
                "message list must not be empty".into(),
            ));
        }
        if !self.try_attach()? {
            return Err(MemoryError::NotReady(
                "memory table does not exist yet; run the build first".into(),
            ));
        }

        let now = chrono::Utc::now().timestamp_micros() as f64 / 1e6;
        let mut messages: Vec<Message> = new_messages
            .into_iter()
            .filter_map(|m| {
                Message::new(Role::from(m.role), m.timestamp.unwrap_or(now), &m.content)
            })
            .collect();
        messages.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        let chunks = self.chunk(&messages);
        if chunks.is_empty() {
            return Ok(AddOutcome {
                added: 0,
                message: "no non-empty content to add".into(),
            });
        }

        let rows = self.embed_chunks(&chunks)?;
        let added = self.vectors.append(&self.options.table, &rows)?;
        tracing::info!(messages = messages.len(), added, "memory entries appended");
        Ok(AddOutcome {
            added,
            message: format!("appended {added} memory entries from {} messages", messages.len()),
        })
    }

    /// Top-`k` entries nearest to `query`. `k` is clamped to `[1, MAX_K]`.
    pub fn search(&self, query: &str, k: usize) -> MemoryResult<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MemoryError::InvalidArgument("query must not be empty".into()));
        }
        let k = clamp_k(k);
        if !self.try_attach()? {
            return Err(MemoryError::NotReady(
                "memory table not built yet; run the build first".into(),
            ));
        }

        let vector = self.embedder.embed(query)?;
        let hits = self
            .vectors
            .nearest(&self.options.table, &vector, k)?
            .into_iter()
            .map(|n| SearchHit {
                score: n.similarity(),
                distance: n.distance,
                text: n.text,
            })
            .collect();
        Ok(hits)
    }

    fn chunk(&self, messages: &[Message]) -> Vec<Chunk> {
        let embedder = Arc::clone(&self.embedder);
        chunk_messages(
            messages,
            move |text| embedder.count_tokens(text),
            self.options.chunk_tokens,
        )
    }

    fn embed_chunks(&self, chunks: &[Chunk]) -> MemoryResult<Vec<VectorRow>> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;
        if vectors.len() != chunks.len() {
            return Err(MemoryError::Internal(anyhow::anyhow!(
                "embedding provider returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }
        Ok(vectors
            .into_iter()
            .zip(chunks)
            .map(|(vector, chunk)| VectorRow {
                vector,
                text: chunk.text.clone(),
            })
            .collect())
    }
}
