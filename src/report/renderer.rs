//! Report rendering.
//!
//! Turns an [`AggregateReport`] into an ordered document of sections and
//! lines. No statistics are computed here and nothing is known about
//! source adapters; output formats are handled by the generator.

use crate::models::{AggregateReport, Post};
use serde::Serialize;

/// Sentinel shown wherever a computation had nothing to work on.
pub const NO_DATA: &str = "no data";

/// Excerpt budget for replies in the depth-grouped view.
pub const DEPTH_EXCERPT_CHARS: usize = 300;

/// Authors listed in the leaderboard.
pub const LEADERBOARD_SIZE: usize = 15;

pub const MAIN_POST_TITLE: &str = "📌 Main Post";
pub const REPLIES_TITLE: &str = "💬 Replies & Opinions";
pub const AUTHORS_TITLE: &str = "👥 Author Leaderboard";
pub const TEMPORAL_TITLE: &str = "📅 Temporal Range";
pub const LEXICAL_TITLE: &str = "📝 Lexical Frequency";
pub const DISTRIBUTION_TITLE: &str = "📈 Engagement Distribution";
pub const SUMMARY_TITLE: &str = "🎯 Executive Summary";

/// One rendered line. Variants describe intent, not markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Line {
    Heading { text: String },
    Field { label: String, value: String },
    Quote { text: String },
    Ranked { rank: usize, text: String },
    /// Post content shown under a ranked entry.
    Excerpt { text: String },
    Bullet { text: String },
    Text { text: String },
    Note { text: String },
}

impl Line {
    pub fn heading(text: impl Into<String>) -> Self {
        Line::Heading { text: text.into() }
    }

    pub fn field(label: impl Into<String>, value: impl Into<String>) -> Self {
        Line::Field {
            label: label.into(),
            value: value.into(),
        }
    }

    pub fn ranked(rank: usize, text: impl Into<String>) -> Self {
        Line::Ranked {
            rank,
            text: text.into(),
        }
    }

    pub fn excerpt(text: impl Into<String>) -> Self {
        Line::Excerpt { text: text.into() }
    }

    pub fn bullet(text: impl Into<String>) -> Self {
        Line::Bullet { text: text.into() }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Line::Text { text: text.into() }
    }

    pub fn note(text: impl Into<String>) -> Self {
        Line::Note { text: text.into() }
    }

    /// Whether the line belongs to a list block.
    pub fn is_list_item(&self) -> bool {
        matches!(
            self,
            Line::Field { .. } | Line::Ranked { .. } | Line::Bullet { .. }
        )
    }
}

/// A titled report section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub title: String,
    pub lines: Vec<Line>,
}

impl Section {
    fn new(title: &str, lines: Vec<Line>) -> Self {
        Self {
            title: title.to_string(),
            lines,
        }
    }

    fn no_data(title: &str) -> Self {
        Self::new(title, vec![Line::text(NO_DATA)])
    }

    #[cfg(test)]
    pub fn is_no_data(&self) -> bool {
        self.lines == [Line::text(NO_DATA)]
    }
}

/// The rendered report: a title and the sections in fixed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub title: String,
    pub sections: Vec<Section>,
}

/// Display options for the flat ranked-replies list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub top_n: usize,
    pub excerpt_chars: usize,
}

/// Render the aggregate report into a document.
pub fn render(report: &AggregateReport, options: &RenderOptions) -> Document {
    Document {
        title: "Thread Analysis Report".to_string(),
        sections: vec![
            main_post_section(report),
            replies_section(report, options),
            authors_section(report),
            temporal_section(report),
            lexical_section(report),
            distribution_section(report),
            summary_section(report),
        ],
    }
}

/// Format an integer with `,` thousands separators.
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    out
}

/// Average with one decimal place.
pub fn format_avg(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}", v),
        None => NO_DATA.to_string(),
    }
}

/// Percentage with one decimal place.
pub fn format_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}%", v),
        None => NO_DATA.to_string(),
    }
}

/// Cut `content` to `budget` characters, appending `...` when truncated.
pub fn excerpt(content: &str, budget: usize) -> String {
    match content.char_indices().nth(budget) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

fn handle(post: &Post) -> String {
    format!("**@{}**", post.author)
}

fn main_post_section(report: &AggregateReport) -> Section {
    let Some(main) = &report.main else {
        return Section::no_data(MAIN_POST_TITLE);
    };

    let author = if main.display_name.is_empty() {
        format!("@{}", main.author)
    } else {
        format!("@{} ({})", main.author, main.display_name)
    };
    let date = if main.created_at.is_empty() {
        "N/A"
    } else {
        main.created_at.as_str()
    };

    Section::new(
        MAIN_POST_TITLE,
        vec![
            Line::field("Author", author),
            Line::field("Date", date),
            Line::field("Post ID", main.id.as_str()),
            Line::Quote {
                text: main.content.clone(),
            },
            Line::text(format!(
                "{} ❤️ | {} 🔄 | {} 💬",
                format_count(main.likes),
                format_count(main.retweets),
                format_count(main.replies)
            )),
            Line::field("Total engagement", format_count(main.total_engagement())),
        ],
    )
}

fn replies_section(report: &AggregateReport, options: &RenderOptions) -> Section {
    let ranked = &report.ranked_replies;
    if ranked.is_empty() {
        return Section::no_data(REPLIES_TITLE);
    }

    let mut lines = vec![Line::text(format!(
        "{} replies total",
        format_count(ranked.len() as u64)
    ))];

    let shown = ranked.len().min(options.top_n);
    lines.push(Line::heading(format!(
        "Top {} replies by engagement (likes + {} × retweets)",
        format_count(shown as u64),
        report.retweet_weight
    )));

    for (i, entry) in ranked.iter().take(options.top_n).enumerate() {
        lines.push(Line::ranked(
            i + 1,
            format!(
                "{} ({} ❤️, {} 🔄) · score {}",
                handle(&entry.post),
                format_count(entry.post.likes),
                format_count(entry.post.retweets),
                format_count(entry.score)
            ),
        ));
        lines.push(Line::excerpt(excerpt(
            &entry.post.content,
            options.excerpt_chars,
        )));
    }

    if ranked.len() > shown {
        lines.push(Line::note(format!(
            "... and {} more replies",
            format_count((ranked.len() - shown) as u64)
        )));
    }

    for group in &report.depth_groups {
        lines.push(Line::heading(format!(
            "Depth {} · {} replies",
            group.depth,
            format_count(group.total as u64)
        )));

        for (i, post) in group.top.iter().enumerate() {
            lines.push(Line::ranked(
                i + 1,
                format!("{} ({} ❤️)", handle(post), format_count(post.likes)),
            ));
            lines.push(Line::excerpt(excerpt(&post.content, DEPTH_EXCERPT_CHARS)));
        }

        if group.more > 0 {
            lines.push(Line::note(format!(
                "... and {} more replies",
                format_count(group.more as u64)
            )));
        }
    }

    Section::new(REPLIES_TITLE, lines)
}

fn authors_section(report: &AggregateReport) -> Section {
    if report.authors.is_empty() {
        return Section::no_data(AUTHORS_TITLE);
    }

    let mut lines = vec![Line::field(
        "Unique authors",
        format_count(report.authors.len() as u64),
    )];

    for (i, stat) in report.authors.iter().take(LEADERBOARD_SIZE).enumerate() {
        lines.push(Line::ranked(
            i + 1,
            format!(
                "**@{}** - {} posts · {} ❤️ · {} 🔄 · {} ❤️/post",
                stat.author,
                format_count(stat.post_count as u64),
                format_count(stat.total_likes),
                format_count(stat.total_retweets),
                format_avg(stat.avg_likes)
            ),
        ));
    }

    Section::new(AUTHORS_TITLE, lines)
}

fn temporal_section(report: &AggregateReport) -> Section {
    let Some(range) = &report.temporal else {
        return Section::no_data(TEMPORAL_TITLE);
    };

    Section::new(
        TEMPORAL_TITLE,
        vec![
            Line::field("Period", format!("{} to {}", range.earliest, range.latest)),
            Line::field(
                "Posts with timestamp",
                format!(
                    "{}/{}",
                    format_count(range.with_timestamp as u64),
                    format_count(range.total as u64)
                ),
            ),
        ],
    )
}

fn lexical_section(report: &AggregateReport) -> Section {
    let Some(text) = &report.text else {
        return Section::no_data(LEXICAL_TITLE);
    };

    let mut lines = vec![Line::heading("Most frequent words (5+ characters)")];
    if report.terms.is_empty() {
        lines.push(Line::text(NO_DATA));
    }
    for term in &report.terms {
        lines.push(Line::bullet(format!(
            "`{}`: {} occurrences",
            term.term,
            format_count(term.count as u64)
        )));
    }

    lines.push(Line::heading("Text statistics"));
    lines.push(Line::field(
        "Average length",
        format!("{} characters", format_avg(Some(text.avg_length))),
    ));
    lines.push(Line::field(
        "Long posts (200+ characters)",
        format!(
            "{} ({})",
            format_count(text.long_posts as u64),
            format_pct(Some(text.long_pct))
        ),
    ));

    Section::new(LEXICAL_TITLE, lines)
}

fn distribution_section(report: &AggregateReport) -> Section {
    let dist = &report.distribution;
    if dist.replies == 0 {
        return Section::no_data(DISTRIBUTION_TITLE);
    }

    let bucket = |label: &str, count: usize| {
        Line::bullet(format!(
            "{}: {} replies ({})",
            label,
            format_count(count as u64),
            format_pct(dist.percent(count))
        ))
    };

    Section::new(
        DISTRIBUTION_TITLE,
        vec![
            Line::field("Replies", format_count(dist.replies as u64)),
            bucket("High engagement (10+ likes)", dist.high),
            bucket("Medium engagement (3-9 likes)", dist.medium),
            bucket("Low engagement (0-2 likes)", dist.low),
        ],
    )
}

fn summary_section(report: &AggregateReport) -> Section {
    if report.is_empty() {
        return Section::no_data(SUMMARY_TITLE);
    }

    let totals = &report.totals;
    let mut points = vec![
        format!(
            "**Reach:** the main post drew {} replies",
            format_count(report.distribution.replies as u64)
        ),
        format!(
            "**Engagement:** {} ❤️, {} 🔄 and {} 💬 in total ({} interactions)",
            format_count(totals.likes),
            format_count(totals.retweets),
            format_count(totals.replies),
            format_count(totals.total())
        ),
        format!(
            "**Averages:** {} ❤️, {} 🔄 and {} 💬 per post",
            format_avg(totals.per_post(totals.likes)),
            format_avg(totals.per_post(totals.retweets)),
            format_avg(totals.per_post(totals.replies))
        ),
        format!(
            "**Participation:** {} unique authors",
            format_count(report.authors.len() as u64)
        ),
    ];

    if let Some(top) = report.authors.first() {
        points.push(format!(
            "**Most active author:** @{} with {} posts",
            top.author,
            format_count(top.post_count as u64)
        ));
    }
    if let Some(top) = report.ranked_replies.first() {
        points.push(format!(
            "**Most popular reply:** @{} with {} ❤️",
            top.post.author,
            format_count(top.post.likes)
        ));
    }

    let lines = points
        .into_iter()
        .enumerate()
        .map(|(i, text)| Line::ranked(i + 1, text))
        .collect();

    Section::new(SUMMARY_TITLE, lines)
}
