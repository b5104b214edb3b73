//! Core memory type definitions.
//!
//! [`Message`] is one conversational turn produced by the extractor or the
//! add API, [`Chunk`] is a token-bounded run of messages (the unit of
//! embedding), and the outcome types describe what build/add/search did.

use std::ops::Range;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Author of a message. Export data is open-ended, so unknown roles are kept
/// verbatim in [`Role::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        match s {
            "user" => Self::User,
            "assistant" => Self::Assistant,
            "system" => Self::System,
            "tool" => Self::Tool,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Role::from(s.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One conversational turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    /// Seconds since the Unix epoch (UTC). `0.0` means unknown.
    pub timestamp: f64,
    /// Trimmed, non-empty text.
    pub content: String,
}

impl Message {
    /// Build a message, returning `None` when `content` is blank after trimming.
    pub fn new(role: impl Into<Role>, timestamp: f64, content: &str) -> Option<Self> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        Some(Self {
            role: role.into(),
            timestamp,
            content: content.to_string(),
        })
    }

    /// `[ROLE] (ISO-8601): content`, the line stored inside a chunk.
    pub fn render(&self) -> String {
        format!(
            "[{}] ({}): {}",
            self.role.as_str().to_uppercase(),
            iso_timestamp(self.timestamp),
            self.content
        )
    }
}

/// RFC 3339 rendering of an epoch timestamp with an explicit `+00:00` offset,
/// at microsecond precision when there is a fraction.
/// Out-of-range values render as the epoch.
pub fn iso_timestamp(ts: f64) -> String {
    let mut secs = ts.floor();
    let mut micros = ((ts - secs) * 1e6).round();
    if micros >= 1e6 {
        secs += 1.0;
        micros = 0.0;
    }
    let format = if micros > 0.0 {
        SecondsFormat::Micros
    } else {
        SecondsFormat::Secs
    };
    DateTime::<Utc>::from_timestamp(secs as i64, micros as u32 * 1_000)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .to_rfc3339_opts(format, false)
}

/// A contiguous run of messages rendered as one text blob.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    /// Indices of the member messages in the chunker's input.
    pub span: Range<usize>,
    /// Sum of the members' estimated token lengths.
    pub tokens: usize,
}

/// A message submitted through the add API. A missing timestamp is stamped
/// with the time of the call.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewMessage {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

/// What [`build`](super::store::MemoryStore::build) did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildOutcome {
    /// The table already existed with rows; nothing was touched.
    AlreadyBuilt { entries: u64 },
    /// The table was (re)created.
    Built {
        messages: usize,
        chunks: usize,
        /// True when the export held no messages and a placeholder row was written.
        placeholder: bool,
        /// True when an empty leftover table was dropped first.
        healed: bool,
    },
}

/// What [`add`](super::store::MemoryStore::add) did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddOutcome {
    pub added: usize,
    pub message: String,
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,
    /// Cosine similarity to the query (1.0 = identical direction).
    pub score: f64,
    /// Raw L2 distance reported by the vector store.
    pub distance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_roundtrip_keeps_unknown_values() {
        assert_eq!(Role::from("assistant"), Role::Assistant);
        assert_eq!(Role::from("critic"), Role::Other("critic".into()));
        assert_eq!(String::from(Role::Other("critic".into())), "critic");

        let json = serde_json::to_string(&Role::Tool).unwrap();
        assert_eq!(json, "\"tool\"");
        let back: Role = serde_json::from_str("\"moderator\"").unwrap();
        assert_eq!(back, Role::Other("moderator".into()));
    }

    #[test]
    fn blank_content_is_rejected() {
        assert!(Message::new("user", 1.0, "   \n").is_none());
        let msg = Message::new("user", 1.0, "  hi \n").unwrap();
        assert_eq!(msg.content, "hi");
    }

    #[test]
    fn render_uppercases_role_and_formats_time() {
        let msg = Message::new("assistant", 0.0, "hello").unwrap();
        assert_eq!(msg.render(), "[ASSISTANT] (1970-01-01T00:00:00+00:00): hello");

        let other = Message::new("critic", 1_700_000_000.0, "meh").unwrap();
        assert_eq!(other.render(), "[CRITIC] (2023-11-14T22:13:20+00:00): meh");
    }

    #[test]
    fn iso_timestamp_keeps_fraction() {
        assert_eq!(iso_timestamp(1.5), "1970-01-01T00:00:01.500000+00:00");
        assert_eq!(iso_timestamp(2.0), "1970-01-01T00:00:02+00:00");
    }

    #[test]
    fn iso_timestamp_rounds_to_microseconds() {
        assert_eq!(
            iso_timestamp(1_700_000_000.123456),
            "2023-11-14T22:13:20.123456+00:00"
        );
        assert_eq!(iso_timestamp(4.9999999), "1970-01-01T00:00:05+00:00");
    }

    #[test]
    fn build_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(BuildOutcome::AlreadyBuilt { entries: 3 }).unwrap();
        assert_eq!(json["status"], "already_built");
        assert_eq!(json["entries"], 3);
    }
}
