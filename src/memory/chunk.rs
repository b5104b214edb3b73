//! Chunker: greedy, single-pass packing of ordered messages into
//! token-bounded [`Chunk`]s.
//!
//! A chunk closes when the next message would push its token total past the
//! budget. A message larger than the whole budget still becomes a chunk on its
//! own; messages are never split or dropped.

use super::types::{Chunk, Message};

/// Pack `messages` into chunks of at most `budget` estimated tokens.
///
/// `estimate` is applied to each message's content (not the rendered line).
/// Output chunks partition the input exactly, in order.
pub fn chunk_messages(
    messages: &[Message],
    estimate: impl Fn(&str) -> usize,
    budget: usize,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut lines: Vec<String> = Vec::new();
    let mut tokens = 0usize;
    let mut start = 0usize;

    for (i, message) in messages.iter().enumerate() {
        let len = estimate(&message.content);
        if tokens + len > budget && !lines.is_empty() {
            chunks.push(Chunk {
                text: lines.join("\n"),
                span: start..i,
                tokens,
            });
            lines.clear();
            tokens = 0;
            start = i;
        }
        lines.push(message.render());
        tokens += len;
    }

    if !lines.is_empty() {
        chunks.push(Chunk {
            text: lines.join("\n"),
            span: start..messages.len(),
            tokens,
        });
    }

    tracing::debug!(
        messages = messages.len(),
        chunks = chunks.len(),
        budget,
        "split messages into chunks"
    );
    chunks
}
