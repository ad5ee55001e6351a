//! Nitter HTML adapter.
//!
//! Fetches the thread page from a Nitter instance and scrapes every
//! timeline item into a raw record.

use super::{get_text, http_client, with_retries, FetchError, SourceAdapter, ThreadRef};
use crate::config::SourceConfig;
use crate::error::ThreadError;
use crate::models::{AdapterKind, RawRecord};
use async_trait::async_trait;
use chrono::{NaiveDateTime, SecondsFormat};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{info, warn};

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

static TIMELINE_ITEM: Lazy<Selector> = Lazy::new(|| selector("div.timeline-item"));
static TWEET_LINK: Lazy<Selector> = Lazy::new(|| selector("a.tweet-link"));
static USERNAME: Lazy<Selector> = Lazy::new(|| selector("a.username"));
static FULLNAME: Lazy<Selector> = Lazy::new(|| selector("a.fullname"));
static CONTENT: Lazy<Selector> = Lazy::new(|| selector("div.tweet-content"));
static DATE: Lazy<Selector> = Lazy::new(|| selector("span.tweet-date"));
static DATE_LINK: Lazy<Selector> = Lazy::new(|| selector("a[title]"));
static STAT: Lazy<Selector> = Lazy::new(|| selector("span.tweet-stat"));
static ICON_LIKES: Lazy<Selector> = Lazy::new(|| selector(".icon-heart"));
static ICON_RETWEETS: Lazy<Selector> = Lazy::new(|| selector(".icon-retweet"));
static ICON_REPLIES: Lazy<Selector> = Lazy::new(|| selector(".icon-comment"));
static ICON_VIEWS: Lazy<Selector> = Lazy::new(|| selector(".icon-views, .icon-play"));

/// Nitter date titles look like `Nov 19, 2025 · 11:19 PM UTC`.
const NITTER_DATE_FORMAT: &str = "%b %d, %Y · %I:%M %p UTC";

pub struct NitterAdapter {
    client: reqwest::Client,
    instance: String,
    retries: usize,
    retry_delay: Duration,
}

impl NitterAdapter {
    pub fn new(config: &SourceConfig) -> Result<Self, ThreadError> {
        Ok(Self {
            client: http_client(AdapterKind::Nitter, config)?,
            instance: config.nitter_instance.clone(),
            retries: config.retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }
}

#[async_trait]
impl SourceAdapter for NitterAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Nitter
    }

    async fn fetch(&self, thread: &ThreadRef, limit: usize) -> Vec<RawRecord> {
        let url = thread.nitter_url(&self.instance);
        info!("Scraping thread from Nitter: {}", url);

        let html = match with_retries(
            "Nitter request",
            self.retries,
            self.retry_delay,
            FetchError::is_retryable,
            || get_text(&self.client, &url, &[]),
        )
        .await
        {
            Ok(html) => html,
            Err(e) => {
                warn!(
                    "Error accessing Nitter instance {}: {}. Try another instance.",
                    self.instance, e
                );
                return Vec::new();
            }
        };

        let mut records = parse_timeline(&html);
        records.truncate(limit);
        info!(count = records.len(), "Extracted posts from Nitter");
        records
    }
}

/// Scrape all timeline items from a Nitter page, in document order.
///
/// Items without a status link (e.g. "show more" rows) are skipped.
pub fn parse_timeline(html: &str) -> Vec<RawRecord> {
    let document = Html::parse_document(html);

    document
        .select(&TIMELINE_ITEM)
        .filter_map(parse_item)
        .collect()
}

fn parse_item(item: ElementRef<'_>) -> Option<RawRecord> {
    let href = item.select(&TWEET_LINK).next()?.value().attr("href")?;
    let id = status_id_from_href(href);

    let mut record = RawRecord::new(AdapterKind::Nitter);
    if !id.is_empty() {
        record = record.with("id", id);
    }

    if let Some(username) = item.select(&USERNAME).next() {
        record = record.with("author", element_text(username).replace('@', ""));
    }
    if let Some(fullname) = item.select(&FULLNAME).next() {
        record = record.with("author_name", element_text(fullname));
    }
    if let Some(content) = item.select(&CONTENT).next() {
        record = record.with("content", element_text(content));
    }
    if let Some(date) = date_title(item) {
        record = record.with("created_at", nitter_date_to_iso(&date));
    }

    for stat in item.select(&STAT) {
        let key = if stat.select(&ICON_LIKES).next().is_some() {
            "likes"
        } else if stat.select(&ICON_RETWEETS).next().is_some() {
            "retweets"
        } else if stat.select(&ICON_REPLIES).next().is_some() {
            "replies"
        } else if stat.select(&ICON_VIEWS).next().is_some() {
            "views"
        } else {
            continue;
        };
        record = record.with(key, element_text(stat).replace(',', ""));
    }

    Some(record)
}

/// `/user/status/123#m` -> `123`
fn status_id_from_href(href: &str) -> String {
    let last = href.rsplit('/').next().unwrap_or("");
    last.split(['#', '?']).next().unwrap_or("").to_string()
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn date_title(item: ElementRef<'_>) -> Option<String> {
    let date = item.select(&DATE).next()?;
    date.value()
        .attr("title")
        .or_else(|| {
            date.select(&DATE_LINK)
                .next()
                .and_then(|a| a.value().attr("title"))
        })
        .map(String::from)
}

/// Convert a Nitter date title to ISO-8601 so timestamps sort as strings.
/// Unrecognized formats pass through unchanged.
pub fn nitter_date_to_iso(title: &str) -> String {
    NaiveDateTime::parse_from_str(title.trim(), NITTER_DATE_FORMAT)
        .map(|dt| dt.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|_| title.trim().to_string())
}
