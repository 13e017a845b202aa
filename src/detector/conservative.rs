// Conservative detector: for upstream quotas too small to count.
//
// One combined query of at most ten results, polled on the same 15 minute
// cadence as the search cooldown, with stricter tier thresholds so fewer
// posts reach the mint queue. When the cooldown hasn't elapsed the cached
// set is served instead.

use std::time::Duration;

use async_trait::async_trait;

use super::search::SearchCore;
use super::{Detector, PollOutcome, ScanStats};
use crate::scheduler::ScheduleSlot;
use crate::scoring::ScoredPost;
use crate::social::SearchQuery;

pub const POLL_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Smaller than the default cache: a ten-result search never fills more.
pub const CACHE_SIZE: usize = 10;

pub fn default_queries() -> Vec<SearchQuery> {
    vec![SearchQuery::new(
        "min_faves:1000 (#web3 OR #NFT OR #blockchain OR #crypto) -is:retweet",
    )
    .with_max_results(10)]
}

pub struct ConservativeDetector {
    core: SearchCore,
    schedule: ScheduleSlot,
}

impl ConservativeDetector {
    pub fn new(core: SearchCore) -> Self {
        Self {
            core,
            schedule: ScheduleSlot::new(),
        }
    }
}

#[async_trait]
impl Detector for ConservativeDetector {
    fn name(&self) -> &'static str {
        "conservative"
    }

    async fn poll(&self) -> PollOutcome {
        self.core.poll().await
    }

    fn queued_posts(&self) -> Vec<ScoredPost> {
        self.core.cached()
    }

    fn poll_interval(&self) -> Option<Duration> {
        Some(POLL_INTERVAL)
    }

    fn schedule(&self) -> &ScheduleSlot {
        &self.schedule
    }

    fn scan_stats(&self) -> ScanStats {
        self.core.scan_stats()
    }
}
