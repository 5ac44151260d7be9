//! In-memory [`VectorIndex`] implementation for tests.
//!
//! Entries live in a `Vec` behind `std::sync::RwLock`; vector search is
//! brute-force cosine distance over all stored vectors. Filter evaluation
//! reuses the typed filters directly instead of their wire form.

use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::embedding::cosine_similarity;
use crate::error::Result;
use crate::filter::{MetadataFilter, TextFilter};
use crate::index::{IndexGet, IndexQuery, VectorIndex};
use crate::models::ChunkMetadata;

struct Entry {
    id: String,
    document: String,
    metadata: Value,
    embedding: Vec<f32>,
}

impl Entry {
    fn matches(&self, filter: Option<&MetadataFilter>, text_filter: Option<&TextFilter>) -> bool {
        if let Some(f) = filter {
            let parsed: Option<ChunkMetadata> = serde_json::from_value(self.metadata.clone()).ok();
            match parsed {
                Some(meta) if f.matches(&meta) => {}
                _ => return false,
            }
        }
        if let Some(tf) = text_filter {
            if !tf.matches(&self.document) {
                return false;
            }
        }
        true
    }
}

/// Brute-force index used by unit and integration tests.
#[derive(Default)]
pub struct MemoryIndex {
    entries: RwLock<Vec<Entry>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_collection(&self) -> Result<()> {
        Ok(())
    }

    async fn add(
        &self,
        ids: &[String],
        documents: &[String],
        metadatas: &[Value],
        embeddings: &[Vec<f32>],
    ) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        for (((id, document), metadata), embedding) in ids
            .iter()
            .zip(documents.iter())
            .zip(metadatas.iter())
            .zip(embeddings.iter())
        {
            // Upsert semantics, matching a real index's last-write-wins.
            entries.retain(|e| &e.id != id);
            entries.push(Entry {
                id: id.clone(),
                document: document.clone(),
                metadata: metadata.clone(),
                embedding: embedding.clone(),
            });
        }
        Ok(())
    }

    async fn get(
        &self,
        filter: Option<&MetadataFilter>,
        text_filter: Option<&TextFilter>,
        limit: Option<usize>,
    ) -> Result<IndexGet> {
        let entries = self.entries.read().unwrap();
        let mut out = IndexGet::default();
        for entry in entries.iter() {
            if !entry.matches(filter, text_filter) {
                continue;
            }
            out.ids.push(entry.id.clone());
            out.documents.push(entry.document.clone());
            out.metadatas.push(entry.metadata.clone());
            if let Some(limit) = limit {
                if out.ids.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
        text_filter: Option<&TextFilter>,
    ) -> Result<IndexQuery> {
        let entries = self.entries.read().unwrap();
        let mut ranked: Vec<(f32, &Entry)> = entries
            .iter()
            .filter(|e| e.matches(filter, text_filter))
            .map(|e| (1.0 - cosine_similarity(embedding, &e.embedding), e))
            .collect();
        ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);

        let mut out = IndexQuery::default();
        for (distance, entry) in ranked {
            out.ids.push(entry.id.clone());
            out.documents.push(entry.document.clone());
            out.metadatas.push(entry.metadata.clone());
            out.distances.push(distance);
        }
        Ok(out)
    }

    async fn delete(
        &self,
        ids: Option<&[String]>,
        filter: Option<&MetadataFilter>,
    ) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        entries.retain(|e| {
            let by_id = ids.map_or(false, |ids| ids.contains(&e.id));
            let by_filter = filter.map_or(false, |f| e.matches(Some(f), None));
            !(by_id || by_filter)
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(username: &str, message_id: &str, seq: i64) -> Value {
        json!({
            "username": username,
            "message_id": message_id,
            "timestamp": null,
            "original_content": "",
            "sequence_index": seq,
        })
    }

    async fn seeded() -> MemoryIndex {
        let index = MemoryIndex::new();
        index
            .add(
                &["a__1__chunk-0".into(), "a__2__chunk-0".into(), "b__1__chunk-0".into()],
                &[
                    "bitcoin is moving".into(),
                    "quiet day on the markets".into(),
                    "ethereum rollup news".into(),
                ],
                &[meta("a", "1", 0), meta("a", "2", 0), meta("b", "1", 0)],
                &[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
            )
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn add_upserts_by_id() {
        let index = seeded().await;
        assert_eq!(index.len(), 3);
        index
            .add(
                &["a__1__chunk-0".into()],
                &["rewritten".into()],
                &[meta("a", "1", 0)],
                &[vec![1.0, 0.0]],
            )
            .await
            .unwrap();
        assert_eq!(index.len(), 3);
        let got = index.get(None, None, None).await.unwrap();
        assert!(got.documents.contains(&"rewritten".to_string()));
    }

    #[tokio::test]
    async fn query_orders_by_ascending_distance() {
        let index = seeded().await;
        let result = index.query(&[1.0, 0.0], 3, None, None).await.unwrap();
        assert_eq!(result.ids[0], "a__1__chunk-0");
        assert!(result.distances.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn filters_restrict_get_and_query() {
        let index = seeded().await;
        let by_user = MetadataFilter::by_username("a");
        let got = index.get(Some(&by_user), None, None).await.unwrap();
        assert_eq!(got.ids.len(), 2);

        let contains = TextFilter::contains("bitcoin");
        let result = index
            .query(&[1.0, 0.0], 10, None, Some(&contains))
            .await
            .unwrap();
        assert_eq!(result.ids, vec!["a__1__chunk-0".to_string()]);
    }

    #[tokio::test]
    async fn delete_by_ids_and_filter_is_a_union() {
        let index = seeded().await;
        index
            .delete(
                Some(&["a__2__chunk-0".to_string()]),
                Some(&MetadataFilter::by_username("b")),
            )
            .await
            .unwrap();
        let got = index.get(None, None, None).await.unwrap();
        assert_eq!(got.ids, vec!["a__1__chunk-0".to_string()]);
    }
}
