//! Search engine: semantic, hybrid, and filtered-listing retrieval.
//!
//! Mode selection is exclusive and driven by the presence of `query`:
//!
//! - **Semantic** — `query` set: embed it, run a nearest-neighbor lookup
//!   constrained by the metadata filter.
//! - **Hybrid** — `query` set and full-text terms given: the terms become a
//!   text-contains filter (ORed together, ORed into any pre-existing text
//!   filter) so hits must be semantically close AND contain at least one
//!   term.
//! - **Filtered listing** — no `query`: entries are listed straight from
//!   the index by filters, no embedding call, every hit at distance `0.0`.
//!
//! Result assembly is identical across modes, preserving the index's
//! return order.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::filter::{merge_full_text_terms, MetadataFilter, TextFilter};
use crate::index::{IndexQuery, VectorIndex};
use crate::models::{ChunkMetadata, SearchResult, SearchResults};

pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// All inputs for a single search invocation.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: Option<String>,
    pub limit: usize,
    pub metadata_filter: Option<MetadataFilter>,
    /// Pre-existing text filter; full-text terms are merged into it by OR,
    /// never overwriting it.
    pub text_filter: Option<TextFilter>,
    pub full_text_terms: Vec<String>,
    /// Collapse multiple chunks of one source message into one hit.
    pub unique: bool,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: None,
            limit: DEFAULT_SEARCH_LIMIT,
            metadata_filter: None,
            text_filter: None,
            full_text_terms: Vec::new(),
            unique: false,
        }
    }
}

impl SearchRequest {
    pub fn semantic(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    pub fn listing() -> Self {
        Self::default()
    }
}

/// Run one search call and assemble a uniform result set.
pub async fn search(
    index: &dyn VectorIndex,
    embedder: &dyn EmbeddingProvider,
    request: &SearchRequest,
) -> Result<SearchResults> {
    let text_filter =
        merge_full_text_terms(&request.full_text_terms, request.text_filter.clone());

    let raw = match request.query.as_deref() {
        Some(query) => {
            debug!(%query, hybrid = text_filter.is_some(), "running semantic search");
            let embedding = embedder.embed_query(query).await?;
            index
                .query(
                    &embedding,
                    request.limit,
                    request.metadata_filter.as_ref(),
                    text_filter.as_ref(),
                )
                .await?
        }
        None => {
            info!("no query provided, listing entries by filters");
            let listed = index
                .get(
                    request.metadata_filter.as_ref(),
                    text_filter.as_ref(),
                    Some(request.limit),
                )
                .await?;
            let len = listed.ids.len();
            IndexQuery {
                ids: listed.ids,
                documents: listed.documents,
                metadatas: listed.metadatas,
                // Synthetic distances keep the result shape uniform even
                // though no ranking happened.
                distances: vec![0.0; len],
            }
        }
    };

    let mut results = assemble(raw);
    if request.unique {
        dedup_by_message(&mut results);
    }
    results.truncate(request.limit);

    Ok(SearchResults {
        query: request.query.clone(),
        results,
    })
}

/// Zip the index's parallel columns into typed results, preserving order.
/// Rows whose metadata does not parse are skipped with a warning.
fn assemble(raw: IndexQuery) -> Vec<SearchResult> {
    raw.ids
        .into_iter()
        .zip(raw.documents)
        .zip(raw.metadatas)
        .zip(raw.distances)
        .filter_map(|(((chunk_id, document), metadata), distance)| {
            match serde_json::from_value::<ChunkMetadata>(metadata) {
                Ok(metadata) => Some(SearchResult {
                    chunk_id,
                    document,
                    distance,
                    metadata,
                }),
                Err(e) => {
                    warn!(%chunk_id, error = %e, "skipping result with malformed metadata");
                    None
                }
            }
        })
        .collect()
}

/// Keep only the first (best-ranked) hit per source message.
fn dedup_by_message(results: &mut Vec<SearchResult>) {
    let mut seen = HashSet::new();
    results.retain(|r| seen.insert(r.metadata.message_key()));
}
