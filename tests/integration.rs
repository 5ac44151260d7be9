//! End-to-end pipeline tests: raw messages in, search results out, against
//! the in-memory index and a deterministic embedder.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use chat_recall::chunker::MessageChunker;
use chat_recall::embedding::EmbeddingProvider;
use chat_recall::error::{Error, Result};
use chat_recall::filter::MetadataFilter;
use chat_recall::index::VectorIndex;
use chat_recall::index_memory::MemoryIndex;
use chat_recall::ingest::{delete_chunks, ingest_messages, DeleteSelector};
use chat_recall::models::Message;
use chat_recall::search::{search, SearchRequest};

/// Projects texts onto a fixed two-axis space: bitcoin-flavored texts on
/// one axis, everything else on the other.
struct StubEmbedder {
    calls: AtomicUsize,
}

impl StubEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    fn model_name(&self) -> &str {
        "stub"
    }
    fn dims(&self) -> usize {
        2
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                if lower.contains("bitcoin") || lower.contains("btc") {
                    vec![1.0, 0.1]
                } else {
                    vec![0.1, 1.0]
                }
            })
            .collect())
    }
}

fn sample_messages() -> Vec<Message> {
    vec![
        Message::new(
            "crypto_news",
            "101",
            None,
            "🚀 Bitcoin pushed past key resistance today @trader check \
             https://example.com/chart with strong $BTC volume across venues",
        ),
        Message::new(
            "crypto_news",
            "102",
            None,
            "Quiet day across equity markets with very little movement anywhere",
        ),
        Message::new(
            "eth_daily",
            "201",
            None,
            "Ethereum rollups keep shipping new proof systems every single week",
        ),
    ]
}

async fn seeded() -> (MemoryIndex, StubEmbedder, MessageChunker) {
    let index = MemoryIndex::new();
    let embedder = StubEmbedder::new();
    let chunker = MessageChunker::default();
    ingest_messages(&index, &embedder, &chunker, &sample_messages())
        .await
        .unwrap();
    (index, embedder, chunker)
}

#[tokio::test]
async fn ingest_twice_is_idempotent() {
    let (index, embedder, chunker) = seeded().await;
    let stored = index.len();
    assert_eq!(stored, 3);

    let added = ingest_messages(&index, &embedder, &chunker, &sample_messages())
        .await
        .unwrap();
    assert_eq!(added, 0);
    assert_eq!(index.len(), stored);
    // Only the first ingestion embedded anything.
    assert_eq!(embedder.call_count(), 1);
}

#[tokio::test]
async fn normalization_strips_noise_before_storage() {
    let (index, embedder, _) = seeded().await;
    let results = search(
        &index,
        &embedder,
        &SearchRequest {
            metadata_filter: Some(MetadataFilter {
                username: Some("crypto_news".into()),
                message_id: Some("101".into()),
            }),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(results.len(), 1);
    let hit = &results.results[0];
    assert_eq!(hit.chunk_id, "crypto_news__101__chunk-0");
    assert!(!hit.document.contains('@'));
    assert!(!hit.document.contains("https://"));
    assert!(!hit.document.contains("$BTC"));
    assert!(!hit.document.contains('🚀'));
    // The original text survives untouched in metadata.
    assert!(hit.metadata.original_content.contains("$BTC"));
}

#[tokio::test]
async fn semantic_search_ranks_the_relevant_message_first() {
    let (index, embedder, _) = seeded().await;
    let results = search(
        &index,
        &embedder,
        &SearchRequest::semantic("bitcoin market outlook"),
    )
    .await
    .unwrap();

    assert!(!results.is_empty());
    assert_eq!(results.results[0].metadata.message_id, "101");
    let distances: Vec<f32> = results.iter().map(|r| r.distance).collect();
    assert!(distances.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn full_text_listing_returns_only_matching_chunks_at_distance_zero() {
    let (index, embedder, _) = seeded().await;
    // Three chunks stored, one contains "Bitcoin".
    let results = search(
        &index,
        &embedder,
        &SearchRequest {
            full_text_terms: vec!["Bitcoin".into()],
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results.results[0].distance, 0.0);
    assert_eq!(results.results[0].metadata.message_id, "101");
}

#[tokio::test]
async fn hybrid_search_needs_both_similarity_and_a_term() {
    let (index, embedder, _) = seeded().await;
    let results = search(
        &index,
        &embedder,
        &SearchRequest {
            query: Some("bitcoin".into()),
            full_text_terms: vec!["rollups".into(), "resistance".into()],
            ..Default::default()
        },
    )
    .await
    .unwrap();

    // Message 102 matches neither term; the others match one each.
    assert_eq!(results.len(), 2);
    assert!(results
        .iter()
        .all(|r| r.document.contains("rollups") || r.document.contains("resistance")));
}

#[tokio::test]
async fn delete_by_username_then_ids() {
    let (index, embedder, _) = seeded().await;

    delete_chunks(
        &index,
        None,
        Some(&DeleteSelector {
            username: Some("crypto_news".into()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(index.len(), 1);

    delete_chunks(&index, Some(&["eth_daily__201__chunk-0".to_string()]), None)
        .await
        .unwrap();
    assert_eq!(index.len(), 0);

    let err = delete_chunks(&index, None, None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidDeleteSelector));

    // Deletions never touch the embedding provider.
    assert_eq!(embedder.call_count(), 1);
}

#[tokio::test]
async fn short_noise_messages_store_nothing() {
    let index = MemoryIndex::new();
    let embedder = StubEmbedder::new();
    let chunker = MessageChunker::default();

    // Normalizes to "Hello check": two words, below the minimum.
    let messages = vec![Message::new(
        "chan",
        "1",
        None,
        "Hello @bob check https://x.com #tag $BTC",
    )];
    let added = ingest_messages(&index, &embedder, &chunker, &messages)
        .await
        .unwrap();
    assert_eq!(added, 0);
    assert!(index.is_empty());
    assert_eq!(embedder.call_count(), 0);
}
