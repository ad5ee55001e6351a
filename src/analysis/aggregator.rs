//! Thread aggregation and statistics.
//!
//! This module computes rankings, author statistics, lexical and temporal
//! aggregates, and engagement buckets from a depth-resolved thread. Each
//! sub-computation is independent of the others.

use crate::models::{
    AggregateReport, AuthorStat, DepthGroup, EngagementDistribution, EngagementTotals, Post,
    RankedPost, TemporalRange, TermCount, TextStats, Thread,
};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

/// Replies shown per depth level before the "N more" marker.
pub const DEPTH_GROUP_CAP: usize = 20;

/// Number of terms kept by [`term_frequency`].
pub const TOP_TERMS: usize = 30;

/// Tokens must be longer than this many characters to be counted.
pub const MIN_TERM_CHARS: usize = 4;

/// Posts longer than this many characters count as long.
pub const LONG_POST_CHARS: usize = 200;

/// Like thresholds for the engagement buckets.
pub const HIGH_LIKES: u64 = 10;
pub const MEDIUM_LIKES: u64 = 3;

/// Compute the full aggregate report for one thread.
pub fn aggregate(thread: &Thread, retweet_weight: u64) -> AggregateReport {
    AggregateReport {
        retweet_weight,
        post_count: thread.len(),
        main: thread.main_post().cloned(),
        ranked_replies: rank_posts(thread.replies(), retweet_weight),
        depth_groups: group_by_depth(thread, DEPTH_GROUP_CAP),
        authors: author_stats(&thread.posts),
        temporal: temporal_range(&thread.posts),
        terms: term_frequency(&thread.posts, TOP_TERMS),
        text: text_stats(&thread.posts),
        totals: engagement_totals(&thread.posts),
        distribution: engagement_distribution(thread),
    }
}

/// Rank posts by `likes + k * retweets`, highest first.
///
/// The sort is stable: equal scores keep their fetch order.
pub fn rank_posts<'a>(
    posts: impl IntoIterator<Item = (usize, &'a Post)>,
    retweet_weight: u64,
) -> Vec<RankedPost> {
    let mut ranked: Vec<RankedPost> = posts
        .into_iter()
        .map(|(position, post)| RankedPost {
            position,
            score: post.score(retweet_weight),
            post: post.clone(),
        })
        .collect();

    ranked.sort_by_key(|r| Reverse(r.score));
    ranked
}

/// Group posts by exact author handle, most active first.
///
/// Ties keep the order in which authors first appear.
pub fn author_stats(posts: &[Post]) -> Vec<AuthorStat> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut stats: Vec<AuthorStat> = Vec::new();

    for post in posts {
        let slot = *slots.entry(post.author.as_str()).or_insert_with(|| {
            stats.push(AuthorStat {
                author: post.author.clone(),
                post_count: 0,
                total_likes: 0,
                total_retweets: 0,
                avg_likes: None,
            });
            stats.len() - 1
        });

        let stat = &mut stats[slot];
        stat.post_count += 1;
        stat.total_likes = stat.total_likes.saturating_add(post.likes);
        stat.total_retweets = stat.total_retweets.saturating_add(post.retweets);
    }

    for stat in &mut stats {
        stat.avg_likes =
            (stat.post_count > 0).then(|| stat.total_likes as f64 / stat.post_count as f64);
    }

    stats.sort_by_key(|s| Reverse(s.post_count));
    stats
}

/// Earliest and latest timestamps by plain string ordering.
///
/// ISO-8601 strings sort chronologically, so no date parsing is done.
/// Returns `None` when no post has a timestamp.
pub fn temporal_range(posts: &[Post]) -> Option<TemporalRange> {
    let stamps: Vec<&str> = posts
        .iter()
        .map(|p| p.created_at.as_str())
        .filter(|s| !s.is_empty())
        .collect();

    let earliest = stamps.iter().min()?;
    let latest = stamps.iter().max()?;

    Some(TemporalRange {
        earliest: earliest.to_string(),
        latest: latest.to_string(),
        with_timestamp: stamps.len(),
        total: posts.len(),
    })
}

/// Most frequent lower-cased whitespace tokens longer than four characters.
///
/// Ties are broken by first occurrence in the token stream.
pub fn term_frequency(posts: &[Post], limit: usize) -> Vec<TermCount> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut terms: Vec<TermCount> = Vec::new();

    for post in posts {
        let lowered = post.content.to_lowercase();
        for token in lowered.split_whitespace() {
            if token.chars().count() <= MIN_TERM_CHARS {
                continue;
            }
            match slots.get(token) {
                Some(&slot) => terms[slot].count += 1,
                None => {
                    slots.insert(token.to_string(), terms.len());
                    terms.push(TermCount {
                        term: token.to_string(),
                        count: 1,
                    });
                }
            }
        }
    }

    terms.sort_by_key(|t| Reverse(t.count));
    terms.truncate(limit);
    terms
}

/// Average length and share of long posts, `None` for an empty thread.
pub fn text_stats(posts: &[Post]) -> Option<TextStats> {
    if posts.is_empty() {
        return None;
    }

    let lengths: Vec<usize> = posts.iter().map(|p| p.content.chars().count()).collect();
    let total: usize = lengths.iter().sum();
    let long_posts = lengths.iter().filter(|&&len| len > LONG_POST_CHARS).count();

    Some(TextStats {
        avg_length: total as f64 / posts.len() as f64,
        long_posts,
        long_pct: long_posts as f64 * 100.0 / posts.len() as f64,
    })
}

/// Sum engagement counters over every post.
pub fn engagement_totals(posts: &[Post]) -> EngagementTotals {
    posts
        .iter()
        .fold(EngagementTotals::default(), |mut totals, post| {
            totals.posts += 1;
            totals.likes = totals.likes.saturating_add(post.likes);
            totals.retweets = totals.retweets.saturating_add(post.retweets);
            totals.replies = totals.replies.saturating_add(post.replies);
            totals.views = totals.views.saturating_add(post.views);
            totals
        })
}

/// Bucket the replies by like count: high (10+), medium (3-9), low (<3).
pub fn engagement_distribution(thread: &Thread) -> EngagementDistribution {
    let mut dist = EngagementDistribution::default();

    for (_, post) in thread.replies() {
        dist.replies += 1;
        if post.likes >= HIGH_LIKES {
            dist.high += 1;
        } else if post.likes >= MEDIUM_LIKES {
            dist.medium += 1;
        } else {
            dist.low += 1;
        }
    }

    dist
}

/// Group replies by depth, each group sorted by likes and capped at `cap`.
pub fn group_by_depth(thread: &Thread, cap: usize) -> Vec<DepthGroup> {
    let mut grouped: BTreeMap<u32, Vec<&Post>> = BTreeMap::new();

    for (_, post) in thread.replies() {
        grouped.entry(post.depth).or_default().push(post);
    }

    grouped
        .into_iter()
        .map(|(depth, mut posts)| {
            posts.sort_by_key(|p| Reverse(p.likes));
            let total = posts.len();
            let top: Vec<Post> = posts.into_iter().take(cap).cloned().collect();
            DepthGroup {
                depth,
                total,
                more: total - top.len(),
                top,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::resolve_depths;

    fn create_test_post(id: &str, author: &str, likes: u64, retweets: u64) -> Post {
        let mut post = Post::new(id, author);
        post.likes = likes;
        post.retweets = retweets;
        post
    }

    fn reply(id: &str, author: &str, likes: u64, parent: &str) -> Post {
        let mut post = create_test_post(id, author, likes, 0);
        post.reply_to = Some(parent.to_string());
        post.is_reply = true;
        post
    }

    fn thread_of(posts: Vec<Post>) -> Thread {
        resolve_depths(posts).into_thread()
    }

    #[test]
    fn test_scenario_ranking() {
        let thread = thread_of(vec![
            create_test_post("1", "a", 5, 1),
            reply("2", "b", 10, "1"),
        ]);

        let ranked = rank_posts(thread.posts.iter().enumerate(), 1);
        let ids: Vec<_> = ranked.iter().map(|r| r.post.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
        assert_eq!(ranked[1].score, 6);
    }

    #[test]
    fn test_ranking_is_stable_on_ties() {
        let posts = vec![
            create_test_post("a", "x", 3, 1),
            create_test_post("b", "y", 1, 2),
            create_test_post("c", "z", 9, 0),
            create_test_post("d", "w", 4, 0),
        ];

        let ranked = rank_posts(posts.iter().enumerate(), 1);
        let ids: Vec<_> = ranked.iter().map(|r| r.post.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "d", "b"]);

        let ranked = rank_posts(posts.iter().enumerate(), 2);
        let ids: Vec<_> = ranked.iter().map(|r| r.post.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b", "d"]);
        assert_eq!(ranked[2].position, 1);
    }

    #[test]
    fn test_author_stats() {
        let posts = vec![
            create_test_post("1", "alice", 4, 1),
            create_test_post("2", "Bob", 1, 0),
            create_test_post("3", "alice", 6, 2),
            create_test_post("4", "bob", 0, 0),
        ];

        let stats = author_stats(&posts);
        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0].author, "alice");
        assert_eq!(stats[0].post_count, 2);
        assert_eq!(stats[0].total_likes, 10);
        assert_eq!(stats[0].total_retweets, 3);
        assert_eq!(stats[0].avg_likes, Some(5.0));
        // Case-sensitive, first appearance breaks ties.
        assert_eq!(stats[1].author, "Bob");
        assert_eq!(stats[2].author, "bob");
    }

    #[test]
    fn test_temporal_range_skips_empty() {
        let mut posts = vec![
            create_test_post("1", "a", 0, 0),
            create_test_post("2", "b", 0, 0),
            create_test_post("3", "c", 0, 0),
        ];
        posts[0].created_at = "2024-03-01T10:00:00Z".to_string();
        posts[2].created_at = "2023-12-31T23:59:59Z".to_string();

        let range = temporal_range(&posts).unwrap();
        assert_eq!(range.earliest, "2023-12-31T23:59:59Z");
        assert_eq!(range.latest, "2024-03-01T10:00:00Z");
        assert_eq!(range.with_timestamp, 2);
        assert_eq!(range.total, 3);

        posts.iter_mut().for_each(|p| p.created_at.clear());
        assert_eq!(temporal_range(&posts), None);
    }

    #[test]
    fn test_term_frequency() {
        let mut first = create_test_post("1", "a", 0, 0);
        first.content = "Rust rocks, really RUSTY things. rusty".to_string();
        let mut second = create_test_post("2", "b", 0, 0);
        second.content = "things rusty café ñandúes".to_string();

        let terms = term_frequency(&[first, second], 30);
        let pairs: Vec<_> = terms.iter().map(|t| (t.term.as_str(), t.count)).collect();
        assert_eq!(
            pairs,
            vec![
                ("rusty", 3),
                ("rocks,", 1),
                ("really", 1),
                ("things.", 1),
                ("things", 1),
                ("ñandúes", 1),
            ]
        );
    }

    #[test]
    fn test_term_frequency_limit() {
        let mut post = create_test_post("1", "a", 0, 0);
        post.content = (0..50).map(|i| format!("word{i:03} ")).collect();
        assert_eq!(term_frequency(&[post], TOP_TERMS).len(), TOP_TERMS);
    }

    #[test]
    fn test_distribution_forty_replies() {
        let mut posts = vec![create_test_post("root", "op", 100, 0)];
        for i in 0..40u64 {
            posts.push(reply(&format!("r{i}"), "x", i % 16, "root"));
        }
        let thread = thread_of(posts);

        let dist = engagement_distribution(&thread);
        assert_eq!(dist.replies, 40);
        assert_eq!(dist.high + dist.medium + dist.low, 40);

        let pct_sum: f64 = [dist.high, dist.medium, dist.low]
            .iter()
            .filter_map(|&n| dist.percent(n))
            .map(|p| (p * 10.0).round() / 10.0)
            .sum();
        assert!((pct_sum - 100.0).abs() <= 0.1);
    }

    #[test]
    fn test_bucket_boundaries() {
        let thread = thread_of(vec![
            create_test_post("root", "op", 0, 0),
            reply("a", "x", 2, "root"),
            reply("b", "x", 3, "root"),
            reply("c", "x", 9, "root"),
            reply("d", "x", 10, "root"),
        ]);
        let dist = engagement_distribution(&thread);
        assert_eq!((dist.high, dist.medium, dist.low), (1, 2, 1));
    }

    #[test]
    fn test_group_by_depth_caps() {
        let mut posts = vec![create_test_post("root", "op", 0, 0)];
        for i in 0..25u64 {
            posts.push(reply(&format!("d1-{i}"), "x", i, "root"));
        }
        posts.push(reply("d2", "y", 1, "d1-0"));
        let thread = thread_of(posts);

        let groups = group_by_depth(&thread, DEPTH_GROUP_CAP);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].depth, 1);
        assert_eq!(groups[0].total, 25);
        assert_eq!(groups[0].top.len(), 20);
        assert_eq!(groups[0].more, 5);
        assert_eq!(groups[0].top[0].likes, 24);
        assert_eq!(groups[1].depth, 2);
        assert_eq!(groups[1].more, 0);
    }

    #[test]
    fn test_ranked_reply_sums_match_reply_set() {
        let mut posts = vec![create_test_post("root", "op", 50, 7)];
        for i in 0..45u64 {
            let mut p = reply(&format!("r{i}"), "x", i * 3 % 11, "root");
            p.retweets = i % 4;
            posts.push(p);
        }
        let thread = thread_of(posts);
        let report = aggregate(&thread, 2);

        let ranked_likes: u64 = report.ranked_replies.iter().map(|r| r.post.likes).sum();
        let ranked_rts: u64 = report.ranked_replies.iter().map(|r| r.post.retweets).sum();
        let reply_likes: u64 = thread.replies().map(|(_, p)| p.likes).sum();
        let reply_rts: u64 = thread.replies().map(|(_, p)| p.retweets).sum();
        assert_eq!(ranked_likes, reply_likes);
        assert_eq!(ranked_rts, reply_rts);
        assert_eq!(report.ranked_replies.len(), 45);
    }

    #[test]
    fn test_aggregate_empty_thread() {
        let report = aggregate(&Thread::default(), 1);
        assert!(report.is_empty());
        assert!(report.main.is_none());
        assert!(report.ranked_replies.is_empty());
        assert!(report.authors.is_empty());
        assert!(report.temporal.is_none());
        assert!(report.terms.is_empty());
        assert!(report.text.is_none());
        assert_eq!(report.distribution.percent(0), None);
        assert_eq!(report.totals.per_post(0), None);
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let thread = thread_of(vec![
            create_test_post("1", "a", 5, 1),
            reply("2", "b", 10, "1"),
            reply("3", "c", 10, "2"),
        ]);

        let first = serde_json::to_string(&aggregate(&thread, 1)).unwrap();
        let second = serde_json::to_string(&aggregate(&thread, 1)).unwrap();
        assert_eq!(first, second);
    }
}
