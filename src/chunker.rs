//! Message chunker with recursive size-bounded splitting.
//!
//! Splits a message's normalized text into chunks that respect a
//! configurable size limit, trying ever-finer separators (paragraph →
//! line → sentence → word → character) until every piece fits, while
//! preserving up to `overlap` units of context between adjacent pieces.
//!
//! # Algorithm
//!
//! 1. When `force_paragraph_split` is set, pre-split on `\n\n`; otherwise
//!    treat the whole text as one unit.
//! 2. Within each unit, split on the coarsest separator present; pieces
//!    still over the limit recurse into finer separators, and sibling
//!    pieces are greedily re-merged up to `max_size` with `overlap`
//!    carry-over.
//! 3. Drop pieces with fewer than `min_words` words, the residual noise
//!    left behind by normalization.
//! 4. Flatten embedded newlines to single spaces for storage.
//! 5. Assign `sequence_index` by final order and derive the chunk id.
//!
//! # Guarantees
//!
//! - Empty or whitespace-only input yields zero chunks.
//! - Identical input reproduces identical `(chunk_id, text)` pairs in the
//!   same order.
//! - Every chunk's measured length is ≤ `max_size`, except when a single
//!   atomic unit (one word with no finer separator) already exceeds it.

use std::collections::VecDeque;

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::models::{chunk_id, Chunk, ChunkMetadata, Message};

/// Separator ladder, coarse to fine. The empty separator means
/// character-level splitting.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// Approximate characters-per-token ratio used by the `tokens` measure.
const CHARS_PER_TOKEN: usize = 4;

/// How chunk size is measured against `max_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthMeasure {
    /// Unicode scalar count.
    Chars,
    /// `chars / 4`, rounded up. A rough heuristic standing in for a real
    /// tokenizer.
    ApproxTokens,
}

impl LengthMeasure {
    fn of(&self, text: &str) -> usize {
        let chars = text.chars().count();
        match self {
            LengthMeasure::Chars => chars,
            LengthMeasure::ApproxTokens => chars.div_ceil(CHARS_PER_TOKEN),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessageChunker {
    pub max_size: usize,
    pub overlap: usize,
    pub measure: LengthMeasure,
    pub min_words: usize,
    pub force_paragraph_split: bool,
}

impl Default for MessageChunker {
    fn default() -> Self {
        Self {
            max_size: 150,
            overlap: 0,
            measure: LengthMeasure::Chars,
            min_words: 5,
            force_paragraph_split: false,
        }
    }
}

impl MessageChunker {
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        let measure = match config.measure.as_str() {
            "chars" => LengthMeasure::Chars,
            "tokens" => LengthMeasure::ApproxTokens,
            other => {
                return Err(Error::Config(format!(
                    "unknown chunking.measure: '{other}'"
                )))
            }
        };
        Ok(Self {
            max_size: config.max_size,
            overlap: config.overlap,
            measure,
            min_words: config.min_words,
            force_paragraph_split: config.force_paragraph_split,
        })
    }

    /// Split text into size-bounded, post-filtered chunk texts.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let units: Vec<&str> = if self.force_paragraph_split {
            text.split("\n\n").collect()
        } else {
            vec![text]
        };

        units
            .into_iter()
            .flat_map(|unit| self.split_recursive(unit, SEPARATORS))
            .filter(|piece| piece.unicode_words().count() >= self.min_words)
            .map(|piece| piece.replace('\n', " "))
            .collect()
    }

    /// Chunk one message's normalized content and attach metadata.
    pub fn chunk_message(&self, message: &Message) -> Vec<Chunk> {
        self.split_text(message.normalized_content())
            .into_iter()
            .enumerate()
            .map(|(i, text)| Chunk {
                chunk_id: chunk_id(&message.username, &message.message_id, i),
                text,
                metadata: ChunkMetadata {
                    username: message.username.clone(),
                    message_id: message.message_id.clone(),
                    timestamp: message.timestamp,
                    original_content: message.content.clone(),
                    sequence_index: i as i64,
                },
            })
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        // Coarsest separator actually present in the text; fall back to
        // character splitting when none is.
        let (sep_idx, sep) = separators
            .iter()
            .enumerate()
            .find(|(_, s)| !s.is_empty() && text.contains(**s))
            .map(|(i, s)| (i, *s))
            .unwrap_or((separators.len() - 1, ""));
        let finer = &separators[sep_idx + 1..];

        let splits: Vec<String> = if sep.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(sep)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        };

        let mut out = Vec::new();
        let mut fitting: Vec<String> = Vec::new();
        for piece in splits {
            if self.measure.of(&piece) <= self.max_size {
                fitting.push(piece);
            } else {
                if !fitting.is_empty() {
                    out.extend(self.merge_splits(&fitting, sep));
                    fitting.clear();
                }
                if finer.is_empty() {
                    // Atomic unit larger than the limit; kept whole.
                    out.push(piece);
                } else {
                    out.extend(self.split_recursive(&piece, finer));
                }
            }
        }
        if !fitting.is_empty() {
            out.extend(self.merge_splits(&fitting, sep));
        }
        out
    }

    /// Greedily re-merge sibling pieces up to `max_size`, carrying at most
    /// `overlap` measured units into the next chunk.
    fn merge_splits(&self, splits: &[String], sep: &str) -> Vec<String> {
        let sep_len = self.measure.of(sep);
        let mut docs: Vec<String> = Vec::new();
        let mut window: VecDeque<&String> = VecDeque::new();
        let mut total = 0usize;

        for piece in splits {
            let piece_len = self.measure.of(piece);
            let joined_len = total + piece_len + if window.is_empty() { 0 } else { sep_len };
            if joined_len > self.max_size && !window.is_empty() {
                push_joined(&mut docs, &window, sep);
                // Shrink the window until it is within the overlap budget
                // and the incoming piece fits.
                while total > self.overlap
                    || (total + piece_len + if window.is_empty() { 0 } else { sep_len }
                        > self.max_size
                        && total > 0)
                {
                    let front_len = self.measure.of(window.front().expect("window non-empty"));
                    total -= front_len + if window.len() > 1 { sep_len } else { 0 };
                    window.pop_front();
                }
            }
            total += piece_len + if window.is_empty() { 0 } else { sep_len };
            window.push_back(piece);
        }
        if !window.is_empty() {
            push_joined(&mut docs, &window, sep);
        }
        docs
    }
}

fn push_joined(docs: &mut Vec<String>, window: &VecDeque<&String>, sep: &str) {
    let joined = window
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(sep);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}
