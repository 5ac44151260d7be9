//! Deduplicated ingestion pipeline and deletion.
//!
//! Orchestrates normalize → chunk → existence check → embed → store.
//! Ingestion is at-least-once safe for identical input: re-ingesting
//! unchanged messages never duplicates a (username, message_id,
//! sequence_index) chunk. Changed chunking parameters produce new chunk
//! ids, and old and new chunks then coexist; this layer offers no
//! semantic dedup across parameter changes.
//!
//! Each call performs exactly one existence round trip, at most one
//! batched embedding call, and at most one batched write. A failed call
//! therefore never leaves a partially-inserted batch behind.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::chunker::MessageChunker;
use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::filter::MetadataFilter;
use crate::index::VectorIndex;
use crate::models::{Chunk, Message};

/// Ingest a batch of messages; returns the number of chunks actually added.
///
/// Malformed records (missing username or message id) are skipped with a
/// warning and never fail the batch. Upstream failures (embedding provider,
/// index) abort the whole call with nothing written.
pub async fn ingest_messages(
    index: &dyn VectorIndex,
    embedder: &dyn EmbeddingProvider,
    chunker: &MessageChunker,
    messages: &[Message],
) -> Result<u64> {
    index.ensure_collection().await?;

    let mut candidates: Vec<Chunk> = Vec::new();
    for message in messages {
        if let Err(e) = message.validate() {
            warn!(error = %e, "skipping malformed message record");
            continue;
        }
        candidates.extend(chunker.chunk_message(message));
    }

    // Single existence round trip for the whole batch.
    let stored = index.get(None, None, None).await?;
    let stored: HashSet<String> = stored.ids.into_iter().collect();

    let candidate_count = candidates.len();
    let fresh: Vec<Chunk> = candidates
        .into_iter()
        .filter(|chunk| {
            if stored.contains(&chunk.chunk_id) {
                debug!(chunk_id = %chunk.chunk_id, "skipping chunk already stored");
                false
            } else {
                true
            }
        })
        .collect();

    info!(
        messages = messages.len(),
        candidates = candidate_count,
        fresh = fresh.len(),
        "adding new chunks to the vector store"
    );

    if fresh.is_empty() {
        info!("no new chunks to add");
        return Ok(0);
    }

    let ids: Vec<String> = fresh.iter().map(|c| c.chunk_id.clone()).collect();
    let texts: Vec<String> = fresh.iter().map(|c| c.text.clone()).collect();
    let metadatas: Vec<Value> = fresh
        .iter()
        .map(|c| {
            serde_json::to_value(&c.metadata)
                .map_err(|e| Error::MalformedMessage(format!("unserializable metadata: {e}")))
        })
        .collect::<Result<_>>()?;

    let embeddings = embedder.embed_documents(&texts).await?;
    index.add(&ids, &texts, &metadatas, &embeddings).await?;

    info!(
        added = fresh.len(),
        of = candidate_count,
        "ingestion complete"
    );
    Ok(fresh.len() as u64)
}

/// Collateral selection for [`delete_chunks`].
#[derive(Debug, Clone, Default)]
pub struct DeleteSelector {
    /// Remove every chunk belonging to this username.
    pub username: Option<String>,
}

impl DeleteSelector {
    fn to_filter(&self) -> Option<MetadataFilter> {
        self.username.as_deref().map(MetadataFilter::by_username)
    }
}

/// Delete chunks by explicit id list and/or a collateral selector.
///
/// Supplying both removes the union of the two selections; supplying
/// neither is [`Error::InvalidDeleteSelector`].
pub async fn delete_chunks(
    index: &dyn VectorIndex,
    ids: Option<&[String]>,
    selector: Option<&DeleteSelector>,
) -> Result<()> {
    let ids = ids.filter(|ids| !ids.is_empty());
    let filter = selector.and_then(DeleteSelector::to_filter);
    if ids.is_none() && filter.is_none() {
        return Err(Error::InvalidDeleteSelector);
    }

    index.ensure_collection().await?;
    if let Some(ids) = ids {
        info!(count = ids.len(), "deleting chunks by id");
        index.delete(Some(ids), None).await?;
    }
    if let Some(filter) = filter {
        info!(?filter, "deleting chunks by selector");
        index.delete(None, Some(&filter)).await?;
    }
    Ok(())
}
