//! Search-service adapter.
//!
//! Queries a JSON search endpoint (an snscrape-compatible proxy) for every
//! post in the conversation.

use super::{get_text, http_client, records_from_json, with_retries, FetchError};
use super::{SourceAdapter, ThreadRef};
use crate::config::SourceConfig;
use crate::error::ThreadError;
use crate::models::{AdapterKind, RawRecord};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

pub struct SearchAdapter {
    client: reqwest::Client,
    endpoint: String,
    retries: usize,
    retry_delay: Duration,
}

impl SearchAdapter {
    pub fn new(config: &SourceConfig) -> Result<Self, ThreadError> {
        let endpoint = config
            .search_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                ThreadError::unavailable(AdapterKind::Search, "no search_url configured")
            })?;

        Ok(Self {
            client: http_client(AdapterKind::Search, config)?,
            endpoint,
            retries: config.retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    async fn search(&self, thread: &ThreadRef, limit: usize) -> Result<Vec<RawRecord>, FetchError> {
        let query = [
            ("query", conversation_query(&thread.id)),
            ("limit", limit.to_string()),
        ];
        let body = get_text(&self.client, &self.endpoint, &query).await?;
        parse_results(&body)
    }
}

#[async_trait]
impl SourceAdapter for SearchAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Search
    }

    async fn fetch(&self, thread: &ThreadRef, limit: usize) -> Vec<RawRecord> {
        info!("Searching conversation {} via {}", thread.id, self.endpoint);

        match with_retries(
            "Search request",
            self.retries,
            self.retry_delay,
            FetchError::is_retryable,
            || self.search(thread, limit),
        )
        .await
        {
            Ok(mut records) => {
                records.truncate(limit);
                info!(count = records.len(), "Search returned posts");
                records
            }
            Err(e) => {
                warn!("Search adapter failed: {}", e);
                Vec::new()
            }
        }
    }
}

/// Search operator selecting every post of a conversation.
pub fn conversation_query(thread_id: &str) -> String {
    format!("conversation_id:{}", thread_id)
}

/// Parse a search response body into raw records.
pub fn parse_results(body: &str) -> Result<Vec<RawRecord>, FetchError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    records_from_json(AdapterKind::Search, value)
        .ok_or_else(|| FetchError::Parse("expected an array of posts".to_string()))
}
