//! Thread reconstruction and aggregation.
//!
//! `depth` rebuilds the reply tree; `aggregator` derives every statistic
//! the report shows. Both are synchronous and own their output.

pub mod aggregator;
pub mod depth;

pub use aggregator::*;
pub use depth::resolve_depths;

use crate::models::{AggregateReport, RawRecord, Thread};
use crate::normalize::normalize_all;
use tracing::{debug, warn};

/// A reconstructed thread and its aggregate.
#[derive(Debug, Clone)]
pub struct ThreadAnalysis {
    /// Depth-resolved posts, one per id, in fetch order.
    pub thread: Thread,
    pub report: AggregateReport,
    /// Posts dropped because a later post reused their id.
    pub duplicates: usize,
}

/// Normalize, resolve depths, deduplicate and aggregate one fetch.
pub fn analyze_records(records: &[RawRecord], retweet_weight: u64) -> ThreadAnalysis {
    let resolved = resolve_depths(normalize_all(records));

    let duplicates = resolved.duplicate_count();
    if duplicates > 0 {
        warn!(duplicates, "Duplicate post ids, keeping the last occurrence");
    }

    let thread = resolved.into_thread();
    debug!(
        posts = thread.len(),
        replies = thread.reply_count(),
        "Thread reconstructed"
    );

    let report = aggregate(&thread, retweet_weight);
    ThreadAnalysis {
        thread,
        report,
        duplicates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AdapterKind;

    fn record(id: &str, author: &str, reply_to: Option<&str>, likes: u64) -> RawRecord {
        let record = RawRecord::new(AdapterKind::Archive)
            .with("id", id)
            .with("author", author)
            .with("likes", likes);
        match reply_to {
            Some(parent) => record.with("reply_to", parent),
            None => record,
        }
    }

    #[test]
    fn test_analyze_records() {
        let records = vec![
            record("1", "op", None, 5),
            record("2", "a", Some("1"), 1),
            record("3", "b", Some("2"), 9),
            RawRecord::new(AdapterKind::Archive).with("author", "no id"),
            record("2", "a", Some("1"), 4),
        ];

        let analysis = analyze_records(&records, 1);
        assert_eq!(analysis.duplicates, 1);
        assert_eq!(analysis.thread.len(), 3);
        assert_eq!(analysis.report.post_count, 3);
        assert_eq!(analysis.thread.main_post().map(|p| p.id.as_str()), Some("1"));

        let ranked: Vec<_> = analysis
            .report
            .ranked_replies
            .iter()
            .map(|r| (r.post.id.as_str(), r.post.depth))
            .collect();
        assert_eq!(ranked, vec![("3", 2), ("2", 1)]);
    }

    #[test]
    fn test_analyze_nothing() {
        let analysis = analyze_records(&[], 2);
        assert!(analysis.thread.is_empty());
        assert!(analysis.report.is_empty());
        assert_eq!(analysis.report.retweet_weight, 2);
    }
}
