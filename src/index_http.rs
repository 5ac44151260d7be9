//! HTTP client for a Chroma-style vector index.
//!
//! Implements [`VectorIndex`] against the index's REST API. The collection
//! is resolved lazily on first use (get-or-create, cached for the process
//! lifetime) unless [`ensure_collection`](VectorIndex::ensure_collection)
//! is called explicitly at startup. Transport failures map to
//! [`Error::IndexUnavailable`] and are not retried here.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::filter::{MetadataFilter, TextFilter};
use crate::index::{IndexGet, IndexQuery, VectorIndex};

pub struct ChromaHttpIndex {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    collection_metadata: Value,
    collection_id: OnceCell<String>,
}

impl ChromaHttpIndex {
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: format!("http://{}:{}/api/v1", config.host, config.port),
            collection: config.collection.clone(),
            collection_metadata: json!({
                "hnsw:space": config.distance,
                "hnsw:search_ef": config.search_ef,
            }),
            collection_id: OnceCell::new(),
        })
    }

    /// Construct against a full base URL (tests, non-default deployments).
    pub fn with_base_url(config: &IndexConfig, base_url: impl Into<String>) -> Result<Self> {
        let mut index = Self::new(config)?;
        index.base_url = base_url.into();
        Ok(index)
    }

    /// Collection UUID, resolved once per process via get-or-create.
    async fn collection_id(&self) -> Result<&str> {
        self.collection_id
            .get_or_try_init(|| async {
                let body = json!({
                    "name": self.collection,
                    "metadata": self.collection_metadata,
                    "get_or_create": true,
                });
                let response: CollectionResponse =
                    self.post("collections", &body).await?.json().await.map_err(|e| {
                        Error::IndexUnavailable(format!("invalid collection response: {e}"))
                    })?;
                debug!(collection = %self.collection, id = %response.id, "resolved collection");
                Ok(response.id)
            })
            .await
            .map(String::as_str)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::IndexUnavailable(format!(
                "index returned {status} for {path}: {detail}"
            )));
        }
        Ok(response)
    }
}

fn filter_body(
    filter: Option<&MetadataFilter>,
    text_filter: Option<&TextFilter>,
) -> Map<String, Value> {
    let mut body = Map::new();
    if let Some(wire) = filter.and_then(MetadataFilter::to_wire) {
        body.insert("where".to_string(), wire);
    }
    if let Some(tf) = text_filter {
        body.insert("where_document".to_string(), tf.to_wire());
    }
    body
}

#[derive(Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Deserialize)]
struct RawGet {
    ids: Vec<String>,
    #[serde(default)]
    documents: Option<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Option<Vec<Option<Value>>>,
}

#[derive(Deserialize)]
struct RawQuery {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Value>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<f32>>>,
}

fn unwrap_parallel<T: Default>(column: Option<Vec<Option<T>>>, len: usize) -> Vec<T> {
    match column {
        Some(items) => items.into_iter().map(Option::unwrap_or_default).collect(),
        None => std::iter::repeat_with(T::default).take(len).collect(),
    }
}

#[async_trait]
impl VectorIndex for ChromaHttpIndex {
    async fn ensure_collection(&self) -> Result<()> {
        self.collection_id().await.map(|_| ())
    }

    async fn add(
        &self,
        ids: &[String],
        documents: &[String],
        metadatas: &[Value],
        embeddings: &[Vec<f32>],
    ) -> Result<()> {
        let collection_id = self.collection_id().await?;
        let body = json!({
            "ids": ids,
            "documents": documents,
            "metadatas": metadatas,
            "embeddings": embeddings,
        });
        self.post(&format!("collections/{collection_id}/add"), &body)
            .await?;
        Ok(())
    }

    async fn get(
        &self,
        filter: Option<&MetadataFilter>,
        text_filter: Option<&TextFilter>,
        limit: Option<usize>,
    ) -> Result<IndexGet> {
        let collection_id = self.collection_id().await?;
        let mut body = filter_body(filter, text_filter);
        if let Some(limit) = limit {
            body.insert("limit".to_string(), json!(limit));
        }
        let raw: RawGet = self
            .post(&format!("collections/{collection_id}/get"), &Value::Object(body))
            .await?
            .json()
            .await
            .map_err(|e| Error::IndexUnavailable(format!("invalid get response: {e}")))?;

        let len = raw.ids.len();
        Ok(IndexGet {
            documents: unwrap_parallel(raw.documents, len),
            metadatas: unwrap_parallel(raw.metadatas, len),
            ids: raw.ids,
        })
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
        text_filter: Option<&TextFilter>,
    ) -> Result<IndexQuery> {
        let collection_id = self.collection_id().await?;
        let mut body = filter_body(filter, text_filter);
        body.insert("query_embeddings".to_string(), json!([embedding]));
        body.insert("n_results".to_string(), json!(k));
        let raw: RawQuery = self
            .post(
                &format!("collections/{collection_id}/query"),
                &Value::Object(body),
            )
            .await?
            .json()
            .await
            .map_err(|e| Error::IndexUnavailable(format!("invalid query response: {e}")))?;

        // Single query embedding → first row of each nested column.
        let ids = raw.ids.into_iter().next().unwrap_or_default();
        let len = ids.len();
        Ok(IndexQuery {
            documents: unwrap_parallel(raw.documents.and_then(|d| d.into_iter().next()), len),
            metadatas: unwrap_parallel(raw.metadatas.and_then(|m| m.into_iter().next()), len),
            distances: raw
                .distances
                .and_then(|d| d.into_iter().next())
                .unwrap_or_else(|| vec![0.0; len]),
            ids,
        })
    }

    async fn delete(
        &self,
        ids: Option<&[String]>,
        filter: Option<&MetadataFilter>,
    ) -> Result<()> {
        let collection_id = self.collection_id().await?;
        let path = format!("collections/{collection_id}/delete");
        // Separate requests: the wire protocol intersects criteria given
        // together, but this trait promises the union.
        if let Some(ids) = ids {
            self.post(&path, &json!({ "ids": ids })).await?;
        }
        if let Some(wire) = filter.and_then(MetadataFilter::to_wire) {
            self.post(&path, &json!({ "where": wire })).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn config() -> IndexConfig {
        IndexConfig {
            host: "localhost".into(),
            port: 6300,
            collection: "chat_messages".into(),
            distance: "cosine".into(),
            search_ef: 100,
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn collection_is_created_once_and_cached() {
        let server = MockServer::start_async().await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections")
                    .json_body_partial(r#"{"name": "chat_messages", "get_or_create": true}"#);
                then.status(200)
                    .json_body(serde_json::json!({ "id": "col-123" }));
            })
            .await;
        let get = server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/col-123/get");
                then.status(200).json_body(serde_json::json!({ "ids": [] }));
            })
            .await;

        let index = ChromaHttpIndex::with_base_url(&config(), server.base_url()).unwrap();
        index.ensure_collection().await.unwrap();
        index.get(None, None, None).await.unwrap();
        index.get(None, None, None).await.unwrap();

        create.assert_hits_async(1).await;
        get.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn query_unwraps_nested_columns() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections");
                then.status(200).json_body(serde_json::json!({ "id": "col-1" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/col-1/query");
                then.status(200).json_body(serde_json::json!({
                    "ids": [["a__1__chunk-0"]],
                    "documents": [["bitcoin is moving"]],
                    "metadatas": [[{ "username": "a" }]],
                    "distances": [[0.12]],
                }));
            })
            .await;

        let index = ChromaHttpIndex::with_base_url(&config(), server.base_url()).unwrap();
        let result = index.query(&[1.0, 0.0], 5, None, None).await.unwrap();
        assert_eq!(result.ids, vec!["a__1__chunk-0".to_string()]);
        assert_eq!(result.documents, vec!["bitcoin is moving".to_string()]);
        assert_eq!(result.distances, vec![0.12]);
    }

    #[tokio::test]
    async fn transport_failure_maps_to_index_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections");
                then.status(503).body("down for maintenance");
            })
            .await;

        let index = ChromaHttpIndex::with_base_url(&config(), server.base_url()).unwrap();
        let err = index.ensure_collection().await.unwrap_err();
        assert!(matches!(err, Error::IndexUnavailable(_)));
    }
}
