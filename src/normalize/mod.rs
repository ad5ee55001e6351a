//! Record normalizer.
//!
//! Maps each adapter's raw fields into the canonical [`Post`] schema. This
//! is the only place that knows about adapter-specific key names.

use crate::error::ThreadError;
use crate::models::{AdapterKind, Post, RawRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

static FIRST_INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Handle used when a record carries no author.
pub const UNKNOWN_AUTHOR: &str = "unknown";

/// Key aliases for one adapter, in lookup order. Dotted keys reach into
/// nested objects.
struct FieldAliases {
    id: &'static [&'static str],
    author: &'static [&'static str],
    display_name: &'static [&'static str],
    content: &'static [&'static str],
    created_at: &'static [&'static str],
    likes: &'static [&'static str],
    retweets: &'static [&'static str],
    replies: &'static [&'static str],
    views: &'static [&'static str],
    is_reply: &'static [&'static str],
    reply_to: &'static [&'static str],
}

const SCRAPED_FIELDS: FieldAliases = FieldAliases {
    id: &["id"],
    author: &["author"],
    display_name: &["author_name"],
    content: &["content"],
    created_at: &["created_at"],
    likes: &["likes"],
    retweets: &["retweets"],
    replies: &["replies"],
    views: &["views"],
    is_reply: &["is_reply"],
    reply_to: &["reply_to"],
};

const SEARCH_FIELDS: FieldAliases = FieldAliases {
    id: &["id", "id_str", "rest_id"],
    author: &["user.username", "user.screen_name", "username", "author"],
    display_name: &["user.displayname", "user.name", "author_name"],
    content: &["rawContent", "full_text", "text", "content"],
    created_at: &["date", "created_at"],
    likes: &["likeCount", "favorite_count", "likes"],
    retweets: &["retweetCount", "retweet_count", "retweets"],
    replies: &["replyCount", "reply_count", "replies"],
    views: &["viewCount", "views"],
    is_reply: &["is_reply"],
    reply_to: &[
        "inReplyToTweetId",
        "in_reply_to_status_id_str",
        "in_reply_to_status_id",
        "reply_to",
    ],
};

const ARCHIVE_FIELDS: FieldAliases = FieldAliases {
    id: &["id", "id_str"],
    author: &["author", "username"],
    display_name: &["author_name", "display_name"],
    content: &["content", "text"],
    created_at: &["created_at", "timestamp", "createdAt", "date"],
    likes: &["likes"],
    retweets: &["retweets"],
    replies: &["replies"],
    views: &["views"],
    is_reply: &["is_reply"],
    reply_to: &["reply_to", "in_reply_to"],
};

fn aliases(kind: AdapterKind) -> &'static FieldAliases {
    match kind {
        AdapterKind::Nitter | AdapterKind::Browser => &SCRAPED_FIELDS,
        AdapterKind::Search => &SEARCH_FIELDS,
        AdapterKind::Archive => &ARCHIVE_FIELDS,
    }
}

/// Parse the first integer inside free text such as an accessibility label
/// ("12 Likes. Like"). No digits yields 0.
pub fn parse_count(text: &str) -> u64 {
    FIRST_INTEGER
        .find(text)
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .unwrap_or(0)
}

/// Coerce any JSON value into a non-negative count.
fn count_value(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => parse_count(s),
        _ => 0,
    }
}

fn string_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn bool_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn first<'a>(record: &'a RawRecord, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| record.get(key))
        .find(|v| !v.is_null())
}

fn text_field(record: &RawRecord, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| record.get(key))
        .find_map(string_value)
}

/// Content keeps its inner whitespace; only a missing field defaults to empty.
fn content_field(record: &RawRecord, keys: &[&str]) -> String {
    match first(record, keys) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => string_value(other).unwrap_or_default(),
        None => String::new(),
    }
}

fn count_field(record: &RawRecord, keys: &[&str]) -> u64 {
    first(record, keys).map(count_value).unwrap_or(0)
}

/// Normalize one raw record into a canonical post.
///
/// Fails with [`ThreadError::MalformedRecord`] only when no id can be
/// extracted; every other field has a default.
pub fn normalize(record: &RawRecord) -> Result<Post, ThreadError> {
    let fields = aliases(record.adapter);

    let id = text_field(record, fields.id)
        .ok_or_else(|| ThreadError::malformed(record.adapter, "no extractable id"))?;

    let author = text_field(record, fields.author)
        .map(|a| a.trim_start_matches('@').trim().to_string())
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

    let reply_to = text_field(record, fields.reply_to);
    let is_reply = first(record, fields.is_reply)
        .and_then(bool_value)
        .unwrap_or(reply_to.is_some());

    Ok(Post {
        id,
        author,
        display_name: text_field(record, fields.display_name).unwrap_or_default(),
        content: content_field(record, fields.content),
        created_at: text_field(record, fields.created_at).unwrap_or_default(),
        likes: count_field(record, fields.likes),
        retweets: count_field(record, fields.retweets),
        replies: count_field(record, fields.replies),
        views: count_field(record, fields.views),
        is_reply,
        reply_to,
        depth: 0,
    })
}

/// Normalize a batch, dropping and logging malformed records.
pub fn normalize_all(records: &[RawRecord]) -> Vec<Post> {
    let mut posts = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        match normalize(record) {
            Ok(post) => posts.push(post),
            Err(e) => warn!(index, "Dropping record: {}", e),
        }
    }

    debug!(
        "Normalized {} of {} raw records",
        posts.len(),
        records.len()
    );
    posts
}

/// Root-selection rule: the first post in fetch order that is not a reply;
/// the first post if every post is flagged as a reply.
pub fn select_main(posts: &[Post]) -> Option<usize> {
    if posts.is_empty() {
        return None;
    }
    Some(posts.iter().position(|p| !p.is_reply).unwrap_or(0))
}
