//! Data models for thread reconstruction.
//!
//! This module contains the core data structures used throughout the
//! application: raw adapter records, canonical posts, threads, and the
//! aggregate report model handed to the renderer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Source adapter that produced a raw record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    /// HTML scrape of a Nitter instance
    Nitter,
    /// Conversation search endpoint returning JSON
    Search,
    /// Headless-browser rendered page
    Browser,
    /// Previously exported JSON file
    Archive,
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterKind::Nitter => write!(f, "nitter"),
            AdapterKind::Search => write!(f, "search"),
            AdapterKind::Browser => write!(f, "browser"),
            AdapterKind::Archive => write!(f, "archive"),
        }
    }
}

/// Ranking preset. Live fetches use the summary preset, JSON-file
/// analysis uses the detailed one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RankingProfile {
    /// likes + retweets, top 30, 400 character excerpts
    #[default]
    Summary,
    /// likes + 2 * retweets, top 20, 500 character excerpts
    Detailed,
}

impl RankingProfile {
    /// Weight `k` in `likes + k * retweets`.
    pub fn retweet_weight(&self) -> u64 {
        match self {
            RankingProfile::Summary => 1,
            RankingProfile::Detailed => 2,
        }
    }

    /// Size of the flat ranked-replies list.
    pub fn top_n(&self) -> usize {
        match self {
            RankingProfile::Summary => 30,
            RankingProfile::Detailed => 20,
        }
    }

    /// Character budget for excerpts in the flat ranked list.
    pub fn excerpt_budget(&self) -> usize {
        match self {
            RankingProfile::Summary => 400,
            RankingProfile::Detailed => 500,
        }
    }
}

/// One adapter-native record, before normalization.
///
/// Field names vary by adapter; only the normalizer interprets them.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub adapter: AdapterKind,
    pub fields: Map<String, Value>,
}

impl RawRecord {
    pub fn new(adapter: AdapterKind) -> Self {
        Self {
            adapter,
            fields: Map::new(),
        }
    }

    /// Builder-style field insertion.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Look up a field, following dotted paths into nested objects
    /// (`user.username`).
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.fields.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }
}

/// Canonical post, the unit every stage after the normalizer works on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    /// Handle without the leading `@`; `"unknown"` when the source had none.
    pub author: String,
    #[serde(rename = "author_name", default)]
    pub display_name: String,
    #[serde(default)]
    pub content: String,
    /// ISO-8601 timestamp, empty when unknown.
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub retweets: u64,
    #[serde(default)]
    pub replies: u64,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub is_reply: bool,
    #[serde(default)]
    pub reply_to: Option<String>,
    /// Derived by the depth resolver; never trusted from input.
    #[serde(default)]
    pub depth: u32,
}

impl Post {
    /// Creates a post with the given id and author and zeroed counters.
    #[cfg(test)]
    pub fn new(id: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            author: author.into(),
            display_name: String::new(),
            content: String::new(),
            created_at: String::new(),
            likes: 0,
            retweets: 0,
            replies: 0,
            views: 0,
            is_reply: false,
            reply_to: None,
            depth: 0,
        }
    }

    /// Engagement score used for ranking: `likes + k * retweets`.
    pub fn score(&self, retweet_weight: u64) -> u64 {
        self.likes
            .saturating_add(retweet_weight.saturating_mul(self.retweets))
    }

    /// Likes + retweets + replies.
    pub fn total_engagement(&self) -> u64 {
        self.likes
            .saturating_add(self.retweets)
            .saturating_add(self.replies)
    }
}

/// A root post and its replies, in fetch order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Thread {
    pub posts: Vec<Post>,
    /// Index of the main post in `posts`; `None` only for an empty thread.
    pub main: Option<usize>,
}

impl Thread {
    /// Builds a thread, selecting the main post with the normalizer's root rule.
    pub fn new(posts: Vec<Post>) -> Self {
        let main = crate::normalize::select_main(&posts);
        Self { posts, main }
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn main_post(&self) -> Option<&Post> {
        self.main.and_then(|i| self.posts.get(i))
    }

    /// Every post except the main post, with its fetch-order position.
    pub fn replies(&self) -> impl Iterator<Item = (usize, &Post)> {
        let main = self.main;
        self.posts
            .iter()
            .enumerate()
            .filter(move |(i, _)| Some(*i) != main)
    }

    pub fn reply_count(&self) -> usize {
        self.posts.len().saturating_sub(usize::from(self.main.is_some()))
    }
}

/// A post with its ranking score and original fetch position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedPost {
    pub position: usize,
    pub score: u64,
    pub post: Post,
}

/// Per-author statistics, rebuilt from scratch on every aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorStat {
    pub author: String,
    pub post_count: usize,
    pub total_likes: u64,
    pub total_retweets: u64,
    /// `None` if `post_count` were ever zero.
    pub avg_likes: Option<f64>,
}

/// Lexicographic min/max over the non-empty timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemporalRange {
    pub earliest: String,
    pub latest: String,
    pub with_timestamp: usize,
    pub total: usize,
}

/// A word and its occurrence count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermCount {
    pub term: String,
    pub count: usize,
}

/// Content length statistics over the whole thread.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextStats {
    /// Average content length in characters.
    pub avg_length: f64,
    /// Posts longer than 200 characters.
    pub long_posts: usize,
    pub long_pct: f64,
}

/// Thread-wide engagement sums.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngagementTotals {
    pub posts: usize,
    pub likes: u64,
    pub retweets: u64,
    pub replies: u64,
    pub views: u64,
}

impl EngagementTotals {
    pub fn total(&self) -> u64 {
        self.likes
            .saturating_add(self.retweets)
            .saturating_add(self.replies)
    }

    /// Per-post average of `value`, `None` for an empty thread.
    pub fn per_post(&self, value: u64) -> Option<f64> {
        if self.posts == 0 {
            None
        } else {
            Some(value as f64 / self.posts as f64)
        }
    }
}

/// Like-count buckets over the replies (main post excluded).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngagementDistribution {
    /// Denominator: number of replies.
    pub replies: usize,
    /// 10 or more likes
    pub high: usize,
    /// 3 to 9 likes
    pub medium: usize,
    /// fewer than 3 likes
    pub low: usize,
}

impl EngagementDistribution {
    /// Percentage of replies in a bucket, `None` when there are no replies.
    pub fn percent(&self, count: usize) -> Option<f64> {
        if self.replies == 0 {
            None
        } else {
            Some(count as f64 * 100.0 / self.replies as f64)
        }
    }
}

/// Replies sharing a depth, sorted by likes and capped for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepthGroup {
    pub depth: u32,
    pub total: usize,
    pub top: Vec<Post>,
    /// Replies left out of `top`.
    pub more: usize,
}

/// Everything the renderer needs, computed once per run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateReport {
    pub retweet_weight: u64,
    pub post_count: usize,
    pub main: Option<Post>,
    /// All replies ranked by score; display caps are applied by the renderer.
    pub ranked_replies: Vec<RankedPost>,
    pub depth_groups: Vec<DepthGroup>,
    pub authors: Vec<AuthorStat>,
    pub temporal: Option<TemporalRange>,
    pub terms: Vec<TermCount>,
    pub text: Option<TextStats>,
    pub totals: EngagementTotals,
    pub distribution: EngagementDistribution,
}

impl AggregateReport {
    pub fn is_empty(&self) -> bool {
        self.post_count == 0
    }
}

/// Metadata about a generated report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Thread id (root status id or main post id).
    pub thread_id: String,
    /// Where the posts came from: adapter name or input file.
    pub source: String,
    pub post_count: usize,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_post_score() {
        let mut post = Post::new("1", "a");
        post.likes = 5;
        post.retweets = 3;
        assert_eq!(post.score(1), 8);
        assert_eq!(post.score(2), 11);
        post.replies = 2;
        assert_eq!(post.total_engagement(), 10);
    }

    #[test]
    fn test_raw_record_dotted_lookup() {
        let record = RawRecord::new(AdapterKind::Search)
            .with("id", "42")
            .with("user", json!({"username": "alice"}));

        assert_eq!(record.get("id"), Some(&json!("42")));
        assert_eq!(record.get("user.username"), Some(&json!("alice")));
        assert_eq!(record.get("user.missing"), None);
        assert_eq!(record.get("id.nested"), None);
    }

    #[test]
    fn test_canonical_json_field_names() {
        let mut post = Post::new("1", "alice");
        post.display_name = "Alice".to_string();
        let value = serde_json::to_value(&post).unwrap();
        let object = value.as_object().unwrap();

        for key in [
            "id",
            "author",
            "author_name",
            "content",
            "created_at",
            "likes",
            "retweets",
            "replies",
            "views",
            "is_reply",
            "reply_to",
            "depth",
        ] {
            assert!(object.contains_key(key), "missing {key}");
        }
        assert_eq!(object["likes"], json!(0));
        assert_eq!(object["reply_to"], Value::Null);
    }

    #[test]
    fn test_thread_replies_exclude_main() {
        let mut reply = Post::new("2", "b");
        reply.is_reply = true;
        let thread = Thread::new(vec![Post::new("1", "a"), reply]);

        assert_eq!(thread.main, Some(0));
        assert_eq!(thread.reply_count(), 1);
        let ids: Vec<_> = thread.replies().map(|(_, p)| p.id.as_str()).collect();
        assert_eq!(ids, vec!["2"]);
        assert_eq!(Thread::new(vec![]).reply_count(), 0);
    }

    #[test]
    fn test_distribution_percent_guard() {
        let dist = EngagementDistribution::default();
        assert_eq!(dist.percent(0), None);

        let dist = EngagementDistribution {
            replies: 4,
            high: 1,
            medium: 1,
            low: 2,
        };
        assert_eq!(dist.percent(dist.low), Some(50.0));
    }

    #[test]
    fn test_profile_presets() {
        assert_eq!(RankingProfile::Summary.retweet_weight(), 1);
        assert_eq!(RankingProfile::Detailed.retweet_weight(), 2);
        assert_eq!(RankingProfile::Detailed.top_n(), 20);
        assert_eq!(RankingProfile::Summary.excerpt_budget(), 400);
    }
}
