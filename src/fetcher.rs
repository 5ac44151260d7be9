//! Client for the remote posts API.
//!
//! Pulls message batches from the upstream parser service and maps them
//! into [`Message`] records for ingestion. Transport failures surface as
//! [`Error::SourceUnavailable`]; retries belong to the caller.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

use crate::config::FetcherConfig;
use crate::error::{Error, Result};
use crate::models::Message;

/// Wire shape of one post as served by the upstream API.
#[derive(Debug, Deserialize)]
struct RemotePost {
    message_id: i64,
    text: String,
    #[serde(default)]
    date: Option<DateTime<Utc>>,
    username: String,
}

pub struct PostsClient {
    client: reqwest::Client,
    base_url: String,
}

impl PostsClient {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch up to `limit` posts starting at `offset`, optionally scoped to
    /// the given usernames.
    pub async fn fetch_posts(
        &self,
        usernames: &[String],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>> {
        let mut request = self
            .client
            .get(format!("{}/posts", self.base_url))
            .query(&[("limit", limit.to_string()), ("offset", offset.to_string())]);
        for username in usernames {
            request = request.query(&[("usernames", username)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::SourceUnavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::SourceUnavailable(format!(
                "posts API returned {status}: {detail}"
            )));
        }

        let posts: Vec<RemotePost> = response
            .json()
            .await
            .map_err(|e| Error::SourceUnavailable(format!("invalid posts response: {e}")))?;

        info!(count = posts.len(), "fetched posts from remote source");
        Ok(posts
            .into_iter()
            .map(|p| Message::new(p.username, p.message_id.to_string(), p.date, p.text))
            .collect())
    }
}
