//! Reply-depth resolution.
//!
//! Reconstructs parent/child relationships from `reply_to` references and
//! annotates every post with its distance from the thread root.

use crate::models::{Post, Thread};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Posts annotated with depth, plus the id index used to resolve them.
#[derive(Debug, Clone)]
pub struct ResolvedThread {
    /// Input posts in their original order, `depth` filled in.
    pub posts: Vec<Post>,
    /// id -> position of the last post seen with that id.
    pub index: HashMap<String, usize>,
}

impl ResolvedThread {
    /// Number of posts dropped by [`ResolvedThread::dedup`].
    pub fn duplicate_count(&self) -> usize {
        self.posts.len() - self.index.len()
    }

    /// Keep one post per id (the last one seen), preserving fetch order.
    pub fn dedup(self) -> Vec<Post> {
        let index = self.index;
        self.posts
            .into_iter()
            .enumerate()
            .filter(|(i, post)| index.get(&post.id) == Some(i))
            .map(|(_, post)| post)
            .collect()
    }

    /// Deduplicate and select the main post.
    pub fn into_thread(self) -> Thread {
        Thread::new(self.dedup())
    }
}

/// Build the id index. Duplicate ids resolve to the last occurrence.
pub fn build_index(posts: &[Post]) -> HashMap<String, usize> {
    posts
        .iter()
        .enumerate()
        .map(|(i, post)| (post.id.clone(), i))
        .collect()
}

/// Walk `reply_to` links from `start` toward the root.
///
/// A missing or unknown parent ends the walk at the accumulated depth. A
/// walk that revisits an id never reaches a root and yields 0.
pub fn walk_depth(start: &Post, posts: &[Post], index: &HashMap<String, usize>) -> u32 {
    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(start.id.as_str());

    let mut depth = 0;
    let mut parent = start.reply_to.as_deref();

    while let Some(parent_id) = parent {
        let Some(&position) = index.get(parent_id) else {
            break;
        };
        if !visited.insert(parent_id) {
            debug!(id = %start.id, "reply_to cycle detected");
            return 0;
        }
        depth += 1;
        parent = posts[position].reply_to.as_deref();
    }

    depth
}

/// Annotate every post with its depth. Each post is walked independently.
pub fn resolve_depths(mut posts: Vec<Post>) -> ResolvedThread {
    let index = build_index(&posts);

    let depths: Vec<u32> = posts
        .iter()
        .map(|post| walk_depth(post, &posts, &index))
        .collect();

    for (post, depth) in posts.iter_mut().zip(depths) {
        post.depth = depth;
    }

    ResolvedThread { posts, index }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str, reply_to: Option<&str>) -> Post {
        let mut post = Post::new(id, "author");
        post.reply_to = reply_to.map(String::from);
        post.is_reply = reply_to.is_some();
        post
    }

    fn depths(resolved: &ResolvedThread) -> Vec<u32> {
        resolved.posts.iter().map(|p| p.depth).collect()
    }

    #[test]
    fn test_chain_depths() {
        let resolved = resolve_depths(vec![
            post("1", None),
            post("2", Some("1")),
            post("3", Some("2")),
            post("4", Some("1")),
        ]);
        assert_eq!(depths(&resolved), vec![0, 1, 2, 1]);
    }

    #[test]
    fn test_unresolved_parent_is_root() {
        let resolved = resolve_depths(vec![post("1", Some("missing")), post("2", Some("1"))]);
        assert_eq!(depths(&resolved), vec![0, 1]);
    }

    #[test]
    fn test_two_post_cycle_terminates_at_zero() {
        let resolved = resolve_depths(vec![post("1", Some("2")), post("2", Some("1"))]);
        assert_eq!(depths(&resolved), vec![0, 0]);
    }

    #[test]
    fn test_self_reply_is_zero() {
        let resolved = resolve_depths(vec![post("1", Some("1"))]);
        assert_eq!(depths(&resolved), vec![0]);
    }

    #[test]
    fn test_reply_into_cycle_is_zero() {
        let resolved = resolve_depths(vec![
            post("1", Some("2")),
            post("2", Some("1")),
            post("3", Some("1")),
        ]);
        assert_eq!(depths(&resolved), vec![0, 0, 0]);
    }

    #[test]
    fn test_parent_plus_one_property() {
        let posts = vec![
            post("r", None),
            post("a", Some("r")),
            post("b", Some("a")),
            post("c", Some("b")),
            post("d", Some("a")),
            post("e", Some("zzz")),
        ];
        let resolved = resolve_depths(posts);

        for p in &resolved.posts {
            match p.reply_to.as_ref().and_then(|id| resolved.index.get(id)) {
                Some(&parent) => assert_eq!(p.depth, resolved.posts[parent].depth + 1),
                None => assert_eq!(p.depth, 0),
            }
        }
    }

    #[test]
    fn test_duplicate_ids_last_seen_wins() {
        let mut stale = post("2", None);
        stale.likes = 1;
        let mut fresh = post("2", Some("1"));
        fresh.likes = 9;

        let resolved = resolve_depths(vec![stale, post("1", None), fresh, post("3", Some("2"))]);
        assert_eq!(resolved.index.get("2"), Some(&2));
        assert_eq!(resolved.duplicate_count(), 1);
        // "3" hangs off the last-seen "2", which is itself a reply.
        assert_eq!(resolved.posts[3].depth, 2);

        let deduped = resolved.dedup();
        let ids: Vec<_> = deduped.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(deduped[1].likes, 9);
    }

    #[test]
    fn test_scenario_depths() {
        let mut root = post("1", None);
        root.likes = 5;
        let mut reply = post("2", Some("1"));
        reply.likes = 10;

        let thread = resolve_depths(vec![root, reply]).into_thread();
        assert_eq!(thread.posts[0].depth, 0);
        assert_eq!(thread.posts[1].depth, 1);
        assert_eq!(thread.main, Some(0));
    }
}
