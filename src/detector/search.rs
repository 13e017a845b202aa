// Budget-gated search core shared by the live detector profiles.
//
// One poll: acquire a search budget unit per query, run the acquired
// queries concurrently, merge and dedup by post id, score, keep tier >= 1,
// and fold the survivors into the bounded cache. Queries that could not be
// paid for are skipped for this poll rather than run over budget.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::cache::PostCache;
use super::{PollOutcome, PollStatus, ScanStats};
use crate::budget::{endpoints, BudgetTracker};
use crate::clock::Clock;
use crate::scoring::{score_post, ScoredPost, TierThresholds};
use crate::social::{RawPost, SearchQuery, SocialPlatform};

pub struct SearchCore {
    social: Arc<dyn SocialPlatform>,
    budget: Arc<BudgetTracker>,
    clock: Arc<dyn Clock>,
    queries: Vec<SearchQuery>,
    thresholds: TierThresholds,
    cache: Mutex<PostCache>,
    stats: Mutex<ScanStats>,
}

impl SearchCore {
    pub fn new(
        social: Arc<dyn SocialPlatform>,
        budget: Arc<BudgetTracker>,
        clock: Arc<dyn Clock>,
        queries: Vec<SearchQuery>,
        thresholds: TierThresholds,
        cache_size: usize,
    ) -> Self {
        Self {
            social,
            budget,
            clock,
            queries,
            thresholds,
            cache: Mutex::new(PostCache::new(cache_size)),
            stats: Mutex::new(ScanStats::default()),
        }
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, PostCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn stats(&self) -> std::sync::MutexGuard<'_, ScanStats> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn cached(&self) -> Vec<ScoredPost> {
        self.cache().to_vec()
    }

    pub fn scan_stats(&self) -> ScanStats {
        self.stats().clone()
    }

    fn fallback(&self, status: PollStatus) -> PollOutcome {
        PollOutcome {
            posts: self.cached(),
            status,
        }
    }

    pub async fn poll(&self) -> PollOutcome {
        let now = self.clock.now();
        {
            let mut stats = self.stats();
            stats.polls += 1;
            stats.last_poll_at = Some(now);
        }

        // Pay for queries up front, in order, stopping at the first refusal.
        let mut paid: Vec<&SearchQuery> = Vec::with_capacity(self.queries.len());
        for query in &self.queries {
            match self.budget.try_acquire(endpoints::SEARCH) {
                Ok(()) => paid.push(query),
                Err(e) => {
                    if paid.is_empty() {
                        let retry_after = e.retry_after().unwrap_or_default();
                        info!(
                            retry_after_secs = retry_after.as_secs(),
                            "Search budget exhausted, serving cached posts"
                        );
                        return self.fallback(PollStatus::BudgetExhausted { retry_after });
                    }
                    debug!(
                        skipped = self.queries.len() - paid.len(),
                        "Search budget ran out mid-poll, skipping remaining queries"
                    );
                    break;
                }
            }
        }

        let results = join_all(paid.iter().map(|q| self.social.search(q))).await;

        let mut failures = Vec::new();
        let mut seen = HashSet::new();
        let mut raw: Vec<RawPost> = Vec::new();
        for (query, result) in paid.iter().zip(results) {
            match result {
                Ok(posts) => {
                    for post in posts {
                        if seen.insert(post.id.clone()) {
                            raw.push(post);
                        }
                    }
                }
                Err(e) => {
                    warn!(query = %query.query, error = %e, "Search query failed");
                    failures.push(e.to_string());
                }
            }
        }

        if failures.len() == paid.len() {
            let message = failures.join("; ");
            return self.fallback(PollStatus::UpstreamError(message));
        }

        let scanned = raw.len() as u64;
        let qualifying: Vec<ScoredPost> = raw
            .into_iter()
            .map(|post| score_post(post, now, &self.thresholds))
            .filter(|scored| scored.tier.is_viral())
            .collect();

        let mut fresh = Vec::new();
        {
            let mut cache = self.cache();
            for scored in &qualifying {
                if cache.upsert(scored.clone()) {
                    fresh.push(scored.clone());
                }
            }
        }

        {
            let mut stats = self.stats();
            stats.scanned += scanned;
            stats.qualified += fresh.len() as u64;
        }

        info!(
            queries = paid.len(),
            scanned = scanned,
            qualifying = qualifying.len(),
            new = fresh.len(),
            "Poll complete"
        );

        PollOutcome {
            posts: fresh,
            status: PollStatus::Ok,
        }
    }
}
