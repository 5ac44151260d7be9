//! Core data models that flow through the ingestion and retrieval pipeline.
//!
//! [`Message`] and [`Chunk`] are value objects owned by the caller for the
//! duration of one ingestion call; nothing here retains message data after
//! the corresponding write completes; the external index is the sole
//! durable store.

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::normalize::normalize;

/// A raw chat message as supplied by a message source (HTML export, remote
/// posts API, or direct API input).
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    /// Channel or account the message was posted under.
    pub username: String,
    pub message_id: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Original message text, markup and all.
    pub content: String,
    #[serde(skip)]
    normalized: OnceCell<String>,
}

impl Message {
    pub fn new(
        username: impl Into<String>,
        message_id: impl Into<String>,
        timestamp: Option<DateTime<Utc>>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            message_id: message_id.into(),
            timestamp,
            content: content.into(),
            normalized: OnceCell::new(),
        }
    }

    /// Cleaned-up text, computed once per instance and cached.
    ///
    /// A pure function of `content`; two messages with equal content always
    /// normalize identically.
    pub fn normalized_content(&self) -> &str {
        self.normalized.get_or_init(|| normalize(&self.content))
    }

    /// Check the required fields at the ingestion boundary.
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(Error::MalformedMessage("empty username".into()));
        }
        if self.message_id.trim().is_empty() {
            return Err(Error::MalformedMessage(format!(
                "empty message_id for username '{}'",
                self.username
            )));
        }
        Ok(())
    }
}

/// Typed metadata stored alongside every chunk in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub username: String,
    pub message_id: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// The full original (un-normalized) message text.
    pub original_content: String,
    /// Position of this chunk within its message's chunk sequence.
    pub sequence_index: i64,
}

impl ChunkMetadata {
    /// Stable key identifying the source message, used by the `unique`
    /// search flag to collapse multiple chunks of one message.
    pub fn message_key(&self) -> (String, String) {
        (self.username.clone(), self.message_id.clone())
    }
}

/// A bounded slice of a message's normalized text, individually embedded
/// and stored.
///
/// `chunk_id` is `{username}__{message_id}__chunk-{sequence_index}`: unique
/// per (username, message_id, sequence_index) and stable across repeated
/// chunking of unchanged input. Deduplicated ingestion rests on that
/// stability.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub chunk_id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Compose the deterministic chunk identifier.
pub fn chunk_id(username: &str, message_id: &str, sequence_index: usize) -> String {
    format!("{username}__{message_id}__chunk-{sequence_index}")
}

/// One hit returned from the index, uniform across search modes.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub chunk_id: String,
    /// The stored chunk text.
    pub document: String,
    /// Ascending distance as reported by the index; `0.0` for unranked
    /// filtered listings.
    pub distance: f32,
    pub metadata: ChunkMetadata,
}

/// Ordered result set for one search call. Immutable after construction.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub query: Option<String>,
    pub results: Vec<SearchResult>,
}

impl SearchResults {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SearchResult> {
        self.results.iter()
    }
}

impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Document:\n{}\n", self.document)?;
        writeln!(f, "Metadata:")?;
        writeln!(f, "    Chunk id: {}", self.chunk_id)?;
        writeln!(f, "    Username: {}", self.metadata.username)?;
        writeln!(f, "    Message id: {}", self.metadata.message_id)?;
        if let Some(ts) = self.metadata.timestamp {
            writeln!(f, "    Timestamp: {}", ts.to_rfc3339())?;
        }
        writeln!(f, "    Distance: {}", self.distance)
    }
}

impl fmt::Display for SearchResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Query: {}\n", self.query.as_deref().unwrap_or("(none)"))?;
        for result in &self.results {
            write!(f, "{result}")?;
            writeln!(f, "======")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_content_is_cached_and_pure() {
        let msg = Message::new("chan", "1", None, "Hello   @bob\n\n");
        let first = msg.normalized_content().to_string();
        let second = msg.normalized_content().to_string();
        assert_eq!(first, second);
        assert_eq!(first, "Hello");
    }

    #[test]
    fn chunk_id_is_deterministic() {
        assert_eq!(chunk_id("chan", "1", 0), "chan__1__chunk-0");
        assert_eq!(chunk_id("chan", "1", 0), chunk_id("chan", "1", 0));
        assert_ne!(chunk_id("chan", "1", 0), chunk_id("chan", "1", 1));
    }

    #[test]
    fn validate_rejects_missing_fields() {
        assert!(Message::new("", "1", None, "x").validate().is_err());
        assert!(Message::new("chan", " ", None, "x").validate().is_err());
        assert!(Message::new("chan", "1", None, "").validate().is_ok());
    }
}
