//! Record extractor: conversation export → timestamp-ordered [`Message`]s.
//!
//! Two export layouts are recognized. Locating the export is a short list of
//! strategies tried in priority order; the first one that matches decides the
//! [`Layout`]:
//!
//! 1. `conversations.json` at the source root,
//! 2. `conversations.json` one directory down (archives that wrap everything
//!    in a top-level folder),
//! 3. a `conversations/` directory holding one JSON document per conversation.
//!
//! Each conversation is a `mapping` of node id → node; nodes that carry a
//! `message` contribute one [`Message`] each.

use std::path::{Path, PathBuf};

use serde_json::Value;
use walkdir::WalkDir;

use super::types::Message;
use crate::error::{MemoryError, MemoryResult};

/// File name of the aggregate export document.
pub const AGGREGATE_FILE: &str = "conversations.json";
/// Directory name of the legacy many-file layout.
pub const LEGACY_DIR: &str = "conversations";

/// Where the export lives inside the source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// One aggregate document.
    Aggregate(PathBuf),
    /// A directory of per-conversation documents.
    PerConversation(PathBuf),
}

type Strategy = fn(&Path) -> Option<Layout>;

const STRATEGIES: &[Strategy] = &[root_aggregate, nested_aggregate, legacy_directory];

fn root_aggregate(source: &Path) -> Option<Layout> {
    let path = source.join(AGGREGATE_FILE);
    path.is_file().then_some(Layout::Aggregate(path))
}

fn nested_aggregate(source: &Path) -> Option<Layout> {
    let mut subdirs: Vec<PathBuf> = std::fs::read_dir(source)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_dir())
        .collect();
    subdirs.sort();
    subdirs
        .into_iter()
        .map(|dir| dir.join(AGGREGATE_FILE))
        .find(|p| p.is_file())
        .map(Layout::Aggregate)
}

fn legacy_directory(source: &Path) -> Option<Layout> {
    let dir = source.join(LEGACY_DIR);
    dir.is_dir().then_some(Layout::PerConversation(dir))
}

/// Find the export layout under `source`, trying each strategy in order.
pub fn locate(source: &Path) -> Option<Layout> {
    STRATEGIES.iter().find_map(|strategy| strategy(source))
}

/// Extract every message under `source`, sorted by timestamp (stable).
///
/// Fails with [`MemoryError::NotFound`] only when no layout matches. A
/// malformed aggregate document yields an empty list; a malformed
/// per-conversation file is skipped.
pub fn extract(source: impl AsRef<Path>) -> MemoryResult<Vec<Message>> {
    let source = source.as_ref();
    let layout = locate(source).ok_or_else(|| {
        MemoryError::NotFound(format!(
            "no {AGGREGATE_FILE} or {LEGACY_DIR}/ under {}",
            source.display()
        ))
    })?;
    tracing::info!(?layout, "located conversation export");

    let mut messages = match &layout {
        Layout::Aggregate(path) => match parse_file(path) {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "aggregate export unreadable");
                Vec::new()
            }
        },
        Layout::PerConversation(dir) => read_conversation_dir(dir),
    };

    messages.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    tracing::info!(messages = messages.len(), "found and sorted messages");
    Ok(messages)
}

fn read_conversation_dir(dir: &Path) -> Vec<Message> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    let mut messages = Vec::new();
    let mut skipped = 0usize;
    for path in &files {
        match parse_file(path) {
            Ok(found) => messages.extend(found),
            Err(e) => {
                skipped += 1;
                tracing::warn!(path = %path.display(), error = %e, "skipping conversation file");
            }
        }
    }
    tracing::debug!(files = files.len(), skipped, "parsed conversation files");
    messages
}

/// Parse one JSON export document (a list of conversations or a single one).
pub fn parse_file(path: &Path) -> MemoryResult<Vec<Message>> {
    let bytes = std::fs::read(path)
        .map_err(|e| MemoryError::Malformed(format!("{}: {e}", path.display())))?;
    let doc: Value = serde_json::from_slice(&bytes)
        .map_err(|e| MemoryError::Malformed(format!("{}: {e}", path.display())))?;
    Ok(parse_document(&doc))
}

/// Messages from an already-parsed export document, in document order.
pub fn parse_document(doc: &Value) -> Vec<Message> {
    match doc {
        Value::Array(conversations) => conversations.iter().flat_map(parse_conversation).collect(),
        Value::Object(_) => parse_conversation(doc),
        _ => Vec::new(),
    }
}

fn parse_conversation(conversation: &Value) -> Vec<Message> {
    let Some(mapping) = conversation.get("mapping").and_then(Value::as_object) else {
        return Vec::new();
    };
    mapping
        .values()
        .filter_map(|node| node.get("message"))
        .filter(|message| !message.is_null())
        .filter_map(parse_message)
        .collect()
}

fn parse_message(message: &Value) -> Option<Message> {
    let role = message
        .pointer("/author/role")
        .and_then(Value::as_str)
        .unwrap_or("user");
    let timestamp = message
        .get("create_time")
        .map(parse_timestamp)
        .unwrap_or(0.0);
    let parts = message
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    Message::new(role, timestamp, &join_parts(parts))
}

/// Seconds since epoch, or `0.0` for null, non-numeric, or non-finite values.
fn parse_timestamp(value: &Value) -> f64 {
    let ts = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    ts.filter(|t| t.is_finite()).unwrap_or(0.0)
}

/// Newline-join content parts. Strings are used as-is, other values are
/// stringified as JSON, nulls and empty strings are dropped.
fn join_parts(parts: &[Value]) -> String {
    parts
        .iter()
        .filter_map(|part| match part {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
