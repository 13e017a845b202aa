// Offline social platform.
//
// Serves posts from memory, lets callers bump engagement to simulate growth,
// and records every outgoing message instead of sending it. Used by the
// simulated profile and throughout the test suite.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::posts::{EngagementMetrics, RawPost, SearchQuery};
use super::SocialPlatform;

#[derive(Default)]
struct SimState {
    /// Posts in insertion order, keyed by id for lookup.
    order: Vec<String>,
    posts: HashMap<String, RawPost>,
    sent: Vec<(String, String)>,
    search_calls: usize,
    fail_search: bool,
    /// Users whose next message deliveries fail (consumed one per attempt).
    fail_sends: HashMap<String, u32>,
    missing: HashSet<String>,
}

#[derive(Default)]
pub struct SimulatedPlatform {
    state: Mutex<SimState>,
}

impl SimulatedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_posts(posts: Vec<RawPost>) -> Self {
        let platform = Self::new();
        for post in posts {
            platform.insert_post(post);
        }
        platform
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert_post(&self, post: RawPost) {
        let mut state = self.state();
        if !state.posts.contains_key(&post.id) {
            state.order.push(post.id.clone());
        }
        state.posts.insert(post.id.clone(), post);
    }

    /// Replace a post's engagement counts. Returns false for unknown ids.
    pub fn set_metrics(&self, post_id: &str, metrics: EngagementMetrics) -> bool {
        match self.state().posts.get_mut(post_id) {
            Some(post) => {
                post.metrics = metrics;
                true
            }
            None => false,
        }
    }

    /// Make every search fail until cleared.
    pub fn set_search_failing(&self, failing: bool) {
        self.state().fail_search = failing;
    }

    /// Fail the next `times` deliveries to `user_id`.
    pub fn fail_sends_to(&self, user_id: &str, times: u32) {
        self.state().fail_sends.insert(user_id.to_string(), times);
    }

    /// Make lookups of a post fail as if it had been deleted.
    pub fn remove_post(&self, post_id: &str) {
        self.state().missing.insert(post_id.to_string());
    }

    /// Messages "sent" so far as (user_id, text).
    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.state().sent.clone()
    }

    pub fn search_calls(&self) -> usize {
        self.state().search_calls
    }
}

#[async_trait]
impl SocialPlatform for SimulatedPlatform {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawPost>> {
        let mut state = self.state();
        state.search_calls += 1;
        if state.fail_search {
            anyhow::bail!("simulated search outage for {:?}", query.query);
        }
        let limit = query.max_results.map(|n| n as usize).unwrap_or(usize::MAX);
        let posts = state
            .order
            .iter()
            .filter(|id| !state.missing.contains(*id))
            .filter_map(|id| state.posts.get(id).cloned())
            .take(limit)
            .collect();
        Ok(posts)
    }

    async fn fetch_post(&self, post_id: &str) -> Result<RawPost> {
        let state = self.state();
        if state.missing.contains(post_id) {
            anyhow::bail!("post {post_id} not found");
        }
        state
            .posts
            .get(post_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("post {post_id} not found"))
    }

    async fn send_message(&self, user_id: &str, text: &str) -> Result<()> {
        let mut state = self.state();
        if let Some(remaining) = state.fail_sends.get_mut(user_id) {
            if *remaining > 0 {
                *remaining -= 1;
                anyhow::bail!("simulated delivery failure to {user_id}");
            }
        }
        info!(user_id = user_id, "Simulated message delivered");
        state.sent.push((user_id.to_string(), text.to_string()));
        Ok(())
    }
}
