//! Headless-browser adapter.
//!
//! Runs a short script on a Browserless-style rendering service: load the
//! status page, scroll to the bottom a few times so lazily loaded replies
//! render, and return the page HTML. The post articles are then scraped out
//! of the DOM. The page does not expose reply links, so records carry no
//! parent reference.

use super::{http_client, with_retries, FetchError, SourceAdapter, ThreadRef, STATUS_ID};
use crate::config::SourceConfig;
use crate::error::ThreadError;
use crate::models::{AdapterKind, RawRecord};
use crate::report;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

static ARTICLE: Lazy<Selector> = Lazy::new(|| selector(r#"article[data-testid="tweet"]"#));
static TEXT: Lazy<Selector> = Lazy::new(|| selector(r#"[data-testid="tweetText"]"#));
static USER_NAME: Lazy<Selector> = Lazy::new(|| selector(r#"[data-testid="User-Name"]"#));
static LIKE: Lazy<Selector> =
    Lazy::new(|| selector(r#"[data-testid="like"], [data-testid="unlike"]"#));
static RETWEET: Lazy<Selector> =
    Lazy::new(|| selector(r#"[data-testid="retweet"], [data-testid="unretweet"]"#));
static REPLY: Lazy<Selector> = Lazy::new(|| selector(r#"[data-testid="reply"]"#));
static TIME: Lazy<Selector> = Lazy::new(|| selector("time[datetime]"));
static STATUS_LINK: Lazy<Selector> = Lazy::new(|| selector(r#"a[href*="/status/"]"#));

/// Executed by the `/function` endpoint. Parameters arrive in `context`.
const SCROLL_SCRIPT: &str = r#"export default async function ({ page, context }) {
  const pause = (ms) => new Promise((resolve) => setTimeout(resolve, ms));
  await page.goto(context.url, { waitUntil: "networkidle2", timeout: context.timeoutMs });
  await pause(context.renderWaitMs);
  for (let i = 0; i < context.scrolls; i++) {
    await page.evaluate(() => window.scrollTo(0, document.body.scrollHeight));
    await pause(context.scrollWaitMs);
  }
  return { data: await page.content(), type: "text/html" };
}"#;

pub struct BrowserAdapter {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeout_ms: u64,
    render_wait_ms: u64,
    scroll_count: usize,
    scroll_wait_ms: u64,
    raw_html_dir: Option<PathBuf>,
    retries: usize,
    retry_delay: Duration,
}

impl BrowserAdapter {
    pub fn new(config: &SourceConfig) -> Result<Self, ThreadError> {
        let base_url = config
            .browser_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                ThreadError::unavailable(AdapterKind::Browser, "no browser_url configured")
            })?;

        Ok(Self {
            client: http_client(AdapterKind::Browser, config)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: config.browser_token.clone(),
            timeout_ms: config.timeout_seconds * 1000,
            render_wait_ms: config.render_wait_ms,
            scroll_count: config.scroll_count,
            scroll_wait_ms: config.scroll_wait_ms,
            raw_html_dir: config.raw_html_dir.clone(),
            retries: config.retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    /// Request body for the `/function` endpoint.
    fn function_body(&self, url: &str) -> Value {
        json!({
            "code": SCROLL_SCRIPT,
            "context": {
                "url": url,
                "timeoutMs": self.timeout_ms,
                "renderWaitMs": self.render_wait_ms,
                "scrolls": self.scroll_count,
                "scrollWaitMs": self.scroll_wait_ms,
            },
        })
    }

    /// Fetch the scrolled, fully rendered HTML for `url`.
    async fn render(&self, url: &str) -> Result<String, FetchError> {
        let mut endpoint = format!("{}/function", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }

        debug!(
            "POST {}/function for {} ({} scrolls)",
            self.base_url, url, self.scroll_count
        );
        let resp = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(&self.function_body(url))
            .send()
            .await?;

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

    /// Scrape the rendered page. A page with no articles is usually a login
    /// wall or a changed layout, so it is saved for inspection.
    fn scrape_page(&self, thread: &ThreadRef, html: &str) -> Vec<RawRecord> {
        let records = parse_articles(html);
        if !records.is_empty() {
            return records;
        }

        if let Some(ref dir) = self.raw_html_dir {
            match report::write_output(dir, &raw_html_file_name(&thread.id), html) {
                Ok(path) => warn!("No posts on rendered page, raw HTML saved to {}", path.display()),
                Err(e) => warn!("No posts on rendered page, could not save raw HTML: {:#}", e),
            }
        }
        records
    }
}

#[async_trait]
impl SourceAdapter for BrowserAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Browser
    }

    async fn fetch(&self, thread: &ThreadRef, limit: usize) -> Vec<RawRecord> {
        info!("Rendering {} in headless browser", thread.url);

        let html = match with_retries(
            "Browser render",
            self.retries,
            self.retry_delay,
            FetchError::is_retryable,
            || self.render(&thread.url),
        )
        .await
        {
            Ok(html) => html,
            Err(e) => {
                warn!("Browser adapter failed: {}", e);
                return Vec::new();
            }
        };

        let mut records = self.scrape_page(thread, &html);
        records.truncate(limit);
        info!(count = records.len(), "Found posts on rendered page");
        records
    }
}

fn raw_html_file_name(thread_id: &str) -> String {
    format!("thread-{}-raw.html", thread_id)
}

/// Scrape every post article from a rendered status page.
pub fn parse_articles(html: &str) -> Vec<RawRecord> {
    let document = Html::parse_document(html);

    document
        .select(&ARTICLE)
        .enumerate()
        .map(|(idx, article)| parse_article(idx, article))
        .collect()
}

fn parse_article(idx: usize, article: ElementRef<'_>) -> RawRecord {
    // Articles without a permalink (e.g. ads) still get a stable id.
    let id = article
        .select(&STATUS_LINK)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| STATUS_ID.captures(href).map(|c| c[1].to_string()))
        .unwrap_or_else(|| format!("tweet_{}", idx));

    let mut record = RawRecord::new(AdapterKind::Browser).with("id", id);

    if let Some(text) = article.select(&TEXT).next() {
        record = record.with("content", text.text().collect::<String>().trim());
    }

    if let Some(user) = article.select(&USER_NAME).next() {
        let (handle, name) = user_names(user);
        if let Some(handle) = handle {
            record = record.with("author", handle);
        }
        if let Some(name) = name {
            record = record.with("author_name", name);
        }
    }

    for (key, sel) in [("likes", &*LIKE), ("retweets", &*RETWEET), ("replies", &*REPLY)] {
        if let Some(label) = article
            .select(sel)
            .next()
            .and_then(|b| b.value().attr("aria-label"))
        {
            record = record.with(key, label.replace(',', ""));
        }
    }

    if let Some(datetime) = article
        .select(&TIME)
        .next()
        .and_then(|t| t.value().attr("datetime"))
    {
        record = record.with("created_at", datetime);
    }

    record
}

/// First `@handle` and first plain text node of the user-name block.
fn user_names(user: ElementRef<'_>) -> (Option<String>, Option<String>) {
    let mut handle = None;
    let mut name = None;

    for text in user.text().map(str::trim).filter(|t| !t.is_empty()) {
        if let Some(h) = text.strip_prefix('@') {
            handle.get_or_insert_with(|| h.to_string());
        } else if text != "·" {
            name.get_or_insert_with(|| text.to_string());
        }
    }

    (handle, name)
}
