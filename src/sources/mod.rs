//! Source adapters.
//!
//! Each adapter turns a thread reference into raw, adapter-native records.
//! Fetch failures never escape an adapter: they are logged and reported as
//! zero records so the rest of the pipeline degrades to an empty report.

pub mod archive;
pub mod browser;
pub mod nitter;
pub mod search;

use crate::config::SourceConfig;
use crate::error::ThreadError;
use crate::models::{AdapterKind, RawRecord};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub use archive::{find_archives, is_json_file, load_archive};
pub use browser::BrowserAdapter;
pub use nitter::NitterAdapter;
pub use search::SearchAdapter;

static STATUS_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"status(?:es)?/(\d+)").expect("valid regex"));

/// A validated thread identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRef {
    /// Numeric status id of the root post.
    pub id: String,
    /// URL the reference was given as, or a canonical one for bare ids.
    pub url: String,
}

impl ThreadRef {
    /// Parse a status URL (`.../status/<digits>`) or a bare numeric id.
    pub fn parse(input: &str) -> Result<Self, ThreadError> {
        let input = input.trim();

        if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
            return Ok(Self {
                id: input.to_string(),
                url: format!("https://x.com/i/status/{}", input),
            });
        }

        let captures = STATUS_ID
            .captures(input)
            .ok_or_else(|| ThreadError::InvalidReference(input.to_string()))?;

        Ok(Self {
            id: captures[1].to_string(),
            url: input.to_string(),
        })
    }

    /// Same path on a Nitter instance.
    pub fn nitter_url(&self, instance: &str) -> String {
        let base = if instance.starts_with("http://") || instance.starts_with("https://") {
            instance.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", instance.trim_end_matches('/'))
        };

        let without_scheme = self
            .url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.url);
        let path = without_scheme
            .find('/')
            .map(|i| &without_scheme[i..])
            .unwrap_or("/");

        format!("{}{}", base, path)
    }
}

/// Errors inside an adapter. Never returned past [`SourceAdapter::fetch`].
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),
}

impl FetchError {
    /// Network failures, rate limits and 5xx responses may succeed on a
    /// later attempt. Client errors and unparsable bodies will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::Api { status, .. } => *status == 429 || *status >= 500,
            FetchError::Parse(_) => false,
        }
    }
}

/// A pluggable thread fetcher.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> AdapterKind;

    /// Fetch up to `limit` raw records in fetch order. Total failure yields
    /// an empty vector.
    async fn fetch(&self, thread: &ThreadRef, limit: usize) -> Vec<RawRecord>;
}

/// Construct the adapter for `kind`, or report why it cannot run.
pub fn build_adapter(
    kind: AdapterKind,
    config: &SourceConfig,
) -> Result<Box<dyn SourceAdapter>, ThreadError> {
    match kind {
        AdapterKind::Nitter => Ok(Box::new(NitterAdapter::new(config)?)),
        AdapterKind::Search => Ok(Box::new(SearchAdapter::new(config)?)),
        AdapterKind::Browser => Ok(Box::new(BrowserAdapter::new(config)?)),
        AdapterKind::Archive => Err(ThreadError::unavailable(
            kind,
            "archive input is read from JSON files, not fetched",
        )),
    }
}

/// Build the shared HTTP client for an adapter.
pub(crate) fn http_client(
    kind: AdapterKind,
    config: &SourceConfig,
) -> Result<reqwest::Client, ThreadError> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_seconds))
        .build()
        .map_err(|e| ThreadError::unavailable(kind, format!("HTTP client: {}", e)))
}

/// Run `op` up to `retries + 1` times with exponential backoff. Errors
/// rejected by `retryable` are returned immediately.
pub async fn with_retries<T, E, F, Fut>(
    what: &str,
    retries: usize,
    base_delay: Duration,
    retryable: fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if (attempt as usize) < retries && retryable(&e) => {
                let delay = base_delay.saturating_mul(2u32.saturating_pow(attempt));
                warn!(
                    attempt = attempt + 1,
                    "{} failed: {}. Retrying in {:?}", what, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// GET a URL and return the body, treating non-2xx as an error.
pub(crate) async fn get_text(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<String, FetchError> {
    debug!("GET {}", url);
    let resp = client.get(url).query(query).send().await?;

    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(FetchError::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(resp.text().await?)
}

/// Turn a JSON payload into raw records: a bare array, or an object
/// wrapping the array under `data`, `tweets`, `posts`, or `items`.
///
/// Non-object elements become empty records, which the normalizer rejects.
pub fn records_from_json(kind: AdapterKind, value: Value) -> Option<Vec<RawRecord>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut envelope) => ["data", "tweets", "posts", "items"]
            .iter()
            .find_map(|key| match envelope.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })?,
        _ => return None,
    };

    Some(
        items
            .into_iter()
            .map(|item| match item {
                Value::Object(fields) => RawRecord {
                    adapter: kind,
                    fields,
                },
                _ => RawRecord::new(kind),
            })
            .collect(),
    )
}
