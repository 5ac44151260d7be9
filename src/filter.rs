//! Typed query filters and the OR-merge used by hybrid search.
//!
//! The index speaks two filter languages: a metadata filter (field
//! equality) and a document text filter (`$contains` / `$or`). Both are
//! modeled as owned types here and lowered to the wire shape by the index
//! client; the in-memory index evaluates them directly.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::models::ChunkMetadata;

/// Exact-substring predicate over stored chunk text.
#[derive(Debug, Clone, PartialEq)]
pub enum TextFilter {
    /// The chunk text must contain this term.
    Contains(String),
    /// At least one branch must match.
    Or(Vec<TextFilter>),
}

impl TextFilter {
    pub fn contains(term: impl Into<String>) -> Self {
        TextFilter::Contains(term.into())
    }

    /// Build a filter from user-supplied full-text terms: each term becomes
    /// a contains predicate, multiple terms combine with OR. Blank terms are
    /// ignored; no usable terms yields `None`.
    pub fn from_terms(terms: &[String]) -> Option<Self> {
        let items: Vec<TextFilter> = terms
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| TextFilter::Contains(t.clone()))
            .collect();
        match items.len() {
            0 => None,
            1 => items.into_iter().next(),
            _ => Some(TextFilter::Or(items)),
        }
    }

    /// Lower to the index's JSON filter shape.
    pub fn to_wire(&self) -> Value {
        match self {
            TextFilter::Contains(term) => json!({ "$contains": term }),
            TextFilter::Or(items) => {
                json!({ "$or": items.iter().map(TextFilter::to_wire).collect::<Vec<_>>() })
            }
        }
    }

    /// Evaluate against chunk text (used by the in-memory index).
    pub fn matches(&self, text: &str) -> bool {
        match self {
            TextFilter::Contains(term) => text.contains(term.as_str()),
            TextFilter::Or(items) => items.iter().any(|f| f.matches(text)),
        }
    }
}

/// Merge full-text terms into an optional pre-existing text filter.
///
/// The terms are ORed together, and a pre-existing filter is ORed in as
/// well, never overwritten. Combining both emits a diagnostic since the
/// widened filter is usually not what a caller intended.
pub fn merge_full_text_terms(
    terms: &[String],
    existing: Option<TextFilter>,
) -> Option<TextFilter> {
    let Some(from_terms) = TextFilter::from_terms(terms) else {
        return existing;
    };
    let Some(existing) = existing else {
        return Some(from_terms);
    };

    warn!(
        terms = ?from_terms,
        existing = ?existing,
        "combining full-text terms with an existing text filter (OR)"
    );

    let term_items = match from_terms {
        TextFilter::Or(items) => items,
        single => vec![single],
    };
    let merged = match existing {
        TextFilter::Or(existing_items) => {
            let mut items = term_items;
            items.extend(existing_items);
            items
        }
        single => {
            let mut items = vec![single];
            items.extend(term_items);
            items
        }
    };
    Some(TextFilter::Or(merged))
}

/// Field-equality filter over chunk metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl MetadataFilter {
    pub fn by_username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            message_id: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.message_id.is_none()
    }

    /// Lower to the index's JSON `where` shape; `None` when no fields are
    /// set.
    pub fn to_wire(&self) -> Option<Value> {
        let mut clauses = Vec::new();
        if let Some(ref u) = self.username {
            clauses.push(json!({ "username": { "$eq": u } }));
        }
        if let Some(ref m) = self.message_id {
            clauses.push(json!({ "message_id": { "$eq": m } }));
        }
        match clauses.len() {
            0 => None,
            1 => clauses.into_iter().next(),
            _ => Some(json!({ "$and": clauses })),
        }
    }

    /// Evaluate against a chunk's metadata (used by the in-memory index).
    pub fn matches(&self, meta: &ChunkMetadata) -> bool {
        if let Some(ref u) = self.username {
            if &meta.username != u {
                return false;
            }
        }
        if let Some(ref m) = self.message_id {
            if &meta.message_id != m {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// Flatten a filter into its contained terms for assertions.
    fn collect_terms(filter: &TextFilter, out: &mut Vec<String>) {
        match filter {
            TextFilter::Contains(t) => out.push(t.clone()),
            TextFilter::Or(items) => items.iter().for_each(|f| collect_terms(f, out)),
        }
    }

    #[test]
    fn single_term_is_a_bare_contains() {
        let f = TextFilter::from_terms(&terms(&["BTC"])).unwrap();
        assert_eq!(f, TextFilter::Contains("BTC".into()));
        assert_eq!(f.to_wire(), serde_json::json!({ "$contains": "BTC" }));
    }

    #[test]
    fn multiple_terms_or_together() {
        let f = TextFilter::from_terms(&terms(&["BTC", "ETH"])).unwrap();
        assert!(matches!(f, TextFilter::Or(ref items) if items.len() == 2));
        assert!(f.matches("all about ETH today"));
        assert!(!f.matches("nothing relevant"));
    }

    #[test]
    fn no_usable_terms_is_none() {
        assert!(TextFilter::from_terms(&[]).is_none());
        assert!(TextFilter::from_terms(&terms(&["", "  "])).is_none());
    }

    #[test]
    fn merge_keeps_existing_filter_and_all_terms() {
        let existing = TextFilter::contains("A");
        let merged = merge_full_text_terms(&terms(&["B", "C"]), Some(existing)).unwrap();
        let mut seen = Vec::new();
        collect_terms(&merged, &mut seen);
        seen.sort();
        assert_eq!(seen, vec!["A", "B", "C"]);
        // A OR B OR C
        assert!(merged.matches("has A only"));
        assert!(merged.matches("has B only"));
        assert!(merged.matches("has C only"));
        assert!(!merged.matches("has none"));
    }

    #[test]
    fn merge_into_existing_or_flattens() {
        let existing = TextFilter::Or(vec![TextFilter::contains("A"), TextFilter::contains("B")]);
        let merged = merge_full_text_terms(&terms(&["C"]), Some(existing)).unwrap();
        let mut seen = Vec::new();
        collect_terms(&merged, &mut seen);
        seen.sort();
        assert_eq!(seen, vec!["A", "B", "C"]);
    }

    #[test]
    fn merge_without_terms_returns_existing_unchanged() {
        let existing = TextFilter::contains("A");
        let merged = merge_full_text_terms(&[], Some(existing.clone()));
        assert_eq!(merged, Some(existing));
        assert_eq!(merge_full_text_terms(&[], None), None);
    }

    #[test]
    fn metadata_filter_wire_shapes() {
        assert_eq!(MetadataFilter::default().to_wire(), None);

        let by_user = MetadataFilter::by_username("chan");
        assert_eq!(
            by_user.to_wire(),
            Some(serde_json::json!({ "username": { "$eq": "chan" } }))
        );

        let both = MetadataFilter {
            username: Some("chan".into()),
            message_id: Some("1".into()),
        };
        let wire = both.to_wire().unwrap();
        assert!(wire.get("$and").is_some());
    }

    #[test]
    fn metadata_filter_matches_fields() {
        let meta = ChunkMetadata {
            username: "chan".into(),
            message_id: "1".into(),
            timestamp: None,
            original_content: String::new(),
            sequence_index: 0,
        };
        assert!(MetadataFilter::default().matches(&meta));
        assert!(MetadataFilter::by_username("chan").matches(&meta));
        assert!(!MetadataFilter::by_username("other").matches(&meta));
    }
}
