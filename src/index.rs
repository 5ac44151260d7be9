//! Vector index capability interface.
//!
//! The index is an external collaborator reached through this trait; the
//! library never assumes a particular engine. Implementations must be
//! `Send + Sync` so ingestion and search calls may run concurrently against
//! the same collection. No cross-call ordering is guaranteed here: two
//! concurrent ingestions of the same unseen message can both observe
//! "absent" and both insert, and the index's own upsert/last-write-wins
//! semantics resolve that conflict.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`ensure_collection`](VectorIndex::ensure_collection) | Idempotent get-or-create of the configured collection |
//! | [`add`](VectorIndex::add) | Bulk insert of ids/documents/metadatas/vectors |
//! | [`get`](VectorIndex::get) | Unranked retrieval for existence checks and listings |
//! | [`query`](VectorIndex::query) | Ranked nearest-neighbor lookup |
//! | [`delete`](VectorIndex::delete) | Remove by ids and/or metadata filter |

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::filter::{MetadataFilter, TextFilter};

/// Unranked rows returned from [`VectorIndex::get`]. The three vectors are
/// parallel arrays.
#[derive(Debug, Clone, Default)]
pub struct IndexGet {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<Value>,
}

/// Ranked rows returned from [`VectorIndex::query`], ordered by ascending
/// distance. The four vectors are parallel arrays.
#[derive(Debug, Clone, Default)]
pub struct IndexQuery {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<Value>,
    pub distances: Vec<f32>,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Get-or-create the configured collection with its distance metric and
    /// index parameters. Safe to call repeatedly.
    async fn ensure_collection(&self) -> Result<()>;

    /// Bulk insert. All slices are parallel arrays of equal length. Entries
    /// whose id already exists are upserted by the index.
    async fn add(
        &self,
        ids: &[String],
        documents: &[String],
        metadatas: &[Value],
        embeddings: &[Vec<f32>],
    ) -> Result<()>;

    /// Retrieve stored entries matching the filters, without ranking.
    async fn get(
        &self,
        filter: Option<&MetadataFilter>,
        text_filter: Option<&TextFilter>,
        limit: Option<usize>,
    ) -> Result<IndexGet>;

    /// Nearest-neighbor lookup constrained by the filters; returns up to
    /// `k` rows ordered by ascending distance.
    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
        text_filter: Option<&TextFilter>,
    ) -> Result<IndexQuery>;

    /// Delete entries by id and/or matching filter. When both are supplied
    /// the union of the two selections is removed.
    async fn delete(&self, ids: Option<&[String]>, filter: Option<&MetadataFilter>)
        -> Result<()>;
}
