// Bounded cache of qualifying posts, keyed by post id.
//
// Lookups are O(1) through the map; the deque keeps insertion order so the
// oldest entry is evicted first once the cache is full.

use std::collections::{HashMap, VecDeque};

use crate::scoring::ScoredPost;

pub const DEFAULT_CACHE_SIZE: usize = 100;

pub struct PostCache {
    capacity: usize,
    order: VecDeque<String>,
    posts: HashMap<String, ScoredPost>,
}

impl PostCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            posts: HashMap::new(),
        }
    }

    /// Insert or refresh a post. Returns true if the id was not cached.
    ///
    /// A refresh takes the new metrics and score but never lowers the tier.
    pub fn upsert(&mut self, post: ScoredPost) -> bool {
        if let Some(existing) = self.posts.get_mut(post.id()) {
            let tier = existing.tier;
            *existing = post;
            existing.raise_tier(tier);
            return false;
        }

        self.order.push_back(post.id().to_string());
        self.posts.insert(post.id().to_string(), post);

        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.posts.remove(&oldest);
            }
        }
        true
    }

    pub fn get(&self, post_id: &str) -> Option<&ScoredPost> {
        self.posts.get(post_id)
    }

    pub fn contains(&self, post_id: &str) -> bool {
        self.posts.contains_key(post_id)
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Cached posts, oldest first.
    pub fn to_vec(&self) -> Vec<ScoredPost> {
        self.order
            .iter()
            .filter_map(|id| self.posts.get(id).cloned())
            .collect()
    }
}

impl Default for PostCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::Tier;
    use crate::social::{EngagementMetrics, RawPost};
    use chrono::Utc;

    fn scored(id: &str, likes: u64, tier: Tier) -> ScoredPost {
        ScoredPost {
            post: RawPost {
                id: id.to_string(),
                author_id: "u".to_string(),
                author_handle: "@u".to_string(),
                text: String::new(),
                created_at: Utc::now(),
                metrics: EngagementMetrics::new(likes, 0, 0, 0),
            },
            viral_score: 10,
            tier,
        }
    }

    #[test]
    fn test_dedup_by_id() {
        let mut cache = PostCache::new(10);
        assert!(cache.upsert(scored("a", 1000, Tier::Rising)));
        assert!(!cache.upsert(scored("a", 1200, Tier::Rising)));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").unwrap().post.metrics.likes, 1200);
    }

    #[test]
    fn test_refresh_never_downgrades() {
        let mut cache = PostCache::new(10);
        cache.upsert(scored("a", 6000, Tier::Viral));
        cache.upsert(scored("a", 1500, Tier::Rising));
        assert_eq!(cache.get("a").unwrap().tier, Tier::Viral);
    }

    #[test]
    fn test_evicts_oldest() {
        let mut cache = PostCache::new(2);
        cache.upsert(scored("a", 1000, Tier::Rising));
        cache.upsert(scored("b", 1000, Tier::Rising));
        cache.upsert(scored("c", 1000, Tier::Rising));
        assert!(!cache.contains("a"));
        let ids: Vec<String> = cache.to_vec().into_iter().map(|p| p.post.id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }
}
